//! Trigger policy for the two recurring jobs, plus the Tokio loops that drive them.
//!
//! The policy is pure: given an instant it yields the next firing instant. The
//! loops only sleep and call into the selector or the crawl trigger.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{error, info};

use crate::crawl::trigger_crawl;
use crate::state::AppState;

/// Days searched ahead for the next firing instant. Two weeks covers a weekly
/// trigger whose wall-clock time falls into a DST gap once.
const SEARCH_DAYS: i64 = 15;

#[derive(Debug, Clone, Copy)]
pub struct SchedulePolicy {
    pub tz: Tz,
    pub daily_selection_at: NaiveTime,
    pub weekly_crawl_day: Weekday,
    pub weekly_crawl_at: NaiveTime,
}

/// Human-readable description of one schedule, returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub name: &'static str,
    pub cron: String,
    pub next_run: DateTime<Utc>,
}

impl SchedulePolicy {
    /// Daily selection at 06:00, weekly crawl on Sunday at 02:00, both in `tz`.
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            daily_selection_at: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            weekly_crawl_day: Weekday::Sun,
            weekly_crawl_at: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default(),
        }
    }

    /// Next daily selection strictly after `after`.
    pub fn next_daily_selection(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        self.next_matching(after, self.daily_selection_at, |_| true)
    }

    /// Next weekly crawl strictly after `after`.
    pub fn next_weekly_crawl(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let day = self.weekly_crawl_day;
        self.next_matching(after, self.weekly_crawl_at, |d| d == day)
    }

    pub fn entries(&self, now: DateTime<Utc>) -> Vec<ScheduleEntry> {
        vec![
            ScheduleEntry {
                name: "Weekly Crawl",
                cron: cron_expr(self.weekly_crawl_at, Some(self.weekly_crawl_day)),
                next_run: self.next_weekly_crawl(now),
            },
            ScheduleEntry {
                name: "Daily Selection",
                cron: cron_expr(self.daily_selection_at, None),
                next_run: self.next_daily_selection(now),
            },
        ]
    }

    fn next_matching(
        &self,
        after: DateTime<Utc>,
        at: NaiveTime,
        day_matches: impl Fn(Weekday) -> bool,
    ) -> DateTime<Utc> {
        let start = after.with_timezone(&self.tz).date_naive();
        for offset in 0..SEARCH_DAYS {
            let date = start + Duration::days(offset);
            if !day_matches(date.weekday()) {
                continue;
            }
            // A wall-clock time skipped by DST yields None; try the next match.
            let Some(local) = self.tz.from_local_datetime(&date.and_time(at)).earliest() else {
                continue;
            };
            let candidate = local.with_timezone(&Utc);
            if candidate > after {
                return candidate;
            }
        }
        after + Duration::days(1)
    }
}

fn cron_expr(at: NaiveTime, day: Option<Weekday>) -> String {
    use chrono::Timelike;
    let dow = day
        .map(|d| d.num_days_from_sunday().to_string())
        .unwrap_or_else(|| "*".to_string());
    format!("{} {} * * {}", at.minute(), at.hour(), dow)
}

fn until(next: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (next - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

/// Spawns the daily-selection and weekly-crawl loops on the Tokio runtime.
pub fn spawn_triggers(state: AppState) {
    let policy = state.schedule;
    info!(
        "Scheduler started in {} (selection {}, crawl {} {})",
        policy.tz.name(),
        policy.daily_selection_at,
        policy.weekly_crawl_day,
        policy.weekly_crawl_at
    );

    let selection_state = state.clone();
    tokio::spawn(async move {
        loop {
            let now = selection_state.clock.now();
            let next = policy.next_daily_selection(now);
            info!("Next daily selection at {next}");
            tokio::time::sleep(until(next, now)).await;

            match selection_state.selector.select_daily_prompt().await {
                Ok(Some(prompt)) => info!("Scheduled selection picked {}", prompt.id),
                Ok(None) => info!("Scheduled selection found no eligible prompt"),
                Err(e) => error!("Scheduled selection failed: {e}"),
            }
        }
    });

    tokio::spawn(async move {
        loop {
            let now = state.clock.now();
            let next = policy.next_weekly_crawl(now);
            info!("Next weekly crawl at {next}");
            tokio::time::sleep(until(next, now)).await;

            let crawl = trigger_crawl(state.prompts.as_ref(), &state.sources, state.clock.as_ref());
            match crawl.await {
                Ok(report) => info!(
                    "Scheduled crawl collected {} prompts ({} sources)",
                    report.prompts_found,
                    report.results.len()
                ),
                Err(e) => error!("Scheduled crawl failed: {e}"),
            }
        }
    });
}
