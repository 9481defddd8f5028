//! Selection Orchestrator — Shortlisting → Ranking → Resolving → Recording.
//!
//! Storage failures propagate. Oracle failures never do: a missing or invalid
//! ranking degrades to a uniform random pick from the shortlist, so a daily
//! pick exists whenever anything is eligible. `Ok(None)` means nothing could be
//! selected (or the requested id does not exist) and is not an error.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::models::prompt::{Prompt, ShortlistedPrompt};
use crate::models::selection::SelectionRecord;
use crate::selection::oracle::{RankingOracle, RankingResult};
use crate::selection::shortlist::build_shortlist;
use crate::store::{HistoryLedger, PromptStore, StorageError};

/// How the winning shortlist entry was chosen.
enum Pick {
    Ranked { index: usize, ranking: RankingResult },
    Fallback { index: usize },
}

impl Pick {
    fn index(&self) -> usize {
        match self {
            Pick::Ranked { index, .. } | Pick::Fallback { index } => *index,
        }
    }

    fn into_ranking(self) -> Option<RankingResult> {
        match self {
            Pick::Ranked { ranking, .. } => Some(ranking),
            Pick::Fallback { .. } => None,
        }
    }
}

pub struct DailySelector {
    prompts: Arc<dyn PromptStore>,
    ledger: Arc<dyn HistoryLedger>,
    oracle: Arc<dyn RankingOracle>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    /// One selection-triggering operation at a time per process.
    selection_lock: tokio::sync::Mutex<()>,
}

impl DailySelector {
    pub fn new(
        prompts: Arc<dyn PromptStore>,
        ledger: Arc<dyn HistoryLedger>,
        oracle: Arc<dyn RankingOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prompts,
            ledger,
            oracle,
            clock,
            rng: Mutex::new(StdRng::from_os_rng()),
            selection_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Replaces the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn random_index(&self, len: usize) -> usize {
        self.rng().random_range(0..len)
    }

    /// Runs a full selection for today and records it, replacing any earlier
    /// pick for the same date.
    pub async fn select_daily_prompt(&self) -> Result<Option<Prompt>, StorageError> {
        let _guard = self.selection_lock.lock().await;
        self.run_selection(self.clock.today()).await
    }

    /// Today's pick. Served straight from the ledger when one exists; otherwise
    /// a selection runs and becomes today's entry.
    pub async fn get_today_prompt(&self) -> Result<Option<Prompt>, StorageError> {
        let today = self.clock.today();
        if let Some(record) = self.ledger.find_by_date(today).await? {
            return self.resolve_record(record).await;
        }

        let _guard = self.selection_lock.lock().await;
        // Another caller may have selected while we waited for the lock.
        match self.ledger.find_by_date(today).await? {
            Some(record) => self.resolve_record(record).await,
            None => {
                info!("No selection recorded for {today}, selecting now");
                self.run_selection(today).await
            }
        }
    }

    /// Explicit override of today's pick. No shortlist, no oracle.
    pub async fn update_today_prompt(
        &self,
        prompt_id: &str,
    ) -> Result<Option<Prompt>, StorageError> {
        let _guard = self.selection_lock.lock().await;
        let today = self.clock.today();

        let latest = self.prompts.latest_snapshot().await?;
        let Some(prompt) = latest.into_iter().find(|p| p.id == prompt_id) else {
            warn!("Prompt {prompt_id} not found in latest snapshot; today's pick unchanged");
            return Ok(None);
        };

        let record =
            SelectionRecord::with_prompt(today, prompt.clone(), self.clock.now(), None, None);
        self.ledger.upsert(record).await?;
        info!("Today's prompt ({today}) overridden with {prompt_id}");
        Ok(Some(prompt))
    }

    async fn run_selection(&self, today: NaiveDate) -> Result<Option<Prompt>, StorageError> {
        info!("Starting prompt selection for {today}");

        // Shortlisting
        let snapshot = self.prompts.latest_snapshot().await?;
        let history = self.ledger.load().await?;
        let shortlist = build_shortlist(&snapshot, &history, today, &mut *self.rng());

        if shortlist.is_empty() {
            warn!(
                "No eligible prompts for {today} ({} in latest snapshot); nothing selected",
                snapshot.len()
            );
            return Ok(None);
        }
        info!("Shortlisted {} prompts for ranking", shortlist.len());

        // Ranking
        let pick = match self.oracle.rank(&shortlist).await {
            Some(ranking) => match ranking.selected_index(shortlist.len()) {
                Some(index) => Pick::Ranked { index, ranking },
                None => {
                    warn!(
                        "Oracle chose #{} outside 1..={}, falling back to random selection",
                        ranking.selected_prompt_number,
                        shortlist.len()
                    );
                    Pick::Fallback {
                        index: self.random_index(shortlist.len()),
                    }
                }
            },
            None => {
                warn!("No ranking available, falling back to random selection");
                Pick::Fallback {
                    index: self.random_index(shortlist.len()),
                }
            }
        };

        // Resolving
        let Some((prompt, ranking)) = self.resolve_pick(&shortlist, pick).await? else {
            error!("No shortlisted prompt could be resolved for {today}; nothing selected");
            return Ok(None);
        };

        // Recording
        let (rationale, scores) = match ranking {
            Some(r) => (
                Some(r.reason).filter(|reason| !reason.trim().is_empty()),
                Some(r.ranked).filter(|ranked| !ranked.is_empty()),
            ),
            None => (None, None),
        };
        let via_oracle = rationale.is_some() || scores.is_some();
        let record = SelectionRecord::with_prompt(
            today,
            prompt.clone(),
            self.clock.now(),
            rationale,
            scores,
        );
        self.ledger.upsert(record).await?;

        info!(
            "Selected prompt {} from {} for {today}{}",
            prompt.id,
            prompt.source,
            if via_oracle { " (ranked)" } else { "" }
        );
        Ok(Some(prompt))
    }

    /// Maps the chosen shortlist entry back to its full record in the latest
    /// snapshot. A miss is a consistency error and re-enters with another
    /// random candidate until the shortlist is exhausted.
    async fn resolve_pick(
        &self,
        shortlist: &[ShortlistedPrompt],
        mut pick: Pick,
    ) -> Result<Option<(Prompt, Option<RankingResult>)>, StorageError> {
        let latest = self.prompts.latest_snapshot().await?;
        let mut remaining: Vec<usize> = (0..shortlist.len()).collect();

        loop {
            let index = pick.index();
            let id = &shortlist[index].id;
            if let Some(found) = latest.iter().find(|p| &p.id == id) {
                return Ok(Some((found.clone(), pick.into_ranking())));
            }

            error!("Shortlisted prompt {id} is missing from the latest snapshot");
            remaining.retain(|&i| i != index);
            if remaining.is_empty() {
                return Ok(None);
            }
            pick = Pick::Fallback {
                index: remaining[self.random_index(remaining.len())],
            };
        }
    }

    /// Rebuilds a prompt from a ledger record without re-selecting.
    async fn resolve_record(
        &self,
        record: SelectionRecord,
    ) -> Result<Option<Prompt>, StorageError> {
        if let Some(details) = record.details {
            return Ok(Some(details.prompt));
        }

        debug!(
            "Plain ledger entry for {}, resolving {} from snapshots",
            record.date, record.prompt_id
        );
        let latest = self.prompts.latest_snapshot().await?;
        if let Some(prompt) = latest.into_iter().find(|p| p.id == record.prompt_id) {
            return Ok(Some(prompt));
        }
        let all = self.prompts.all_snapshots().await?;
        let found = all.into_iter().find(|p| p.id == record.prompt_id);
        if found.is_none() {
            warn!("Prompt {} recorded for {} no longer exists", record.prompt_id, record.date);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::prompt::PromptType;
    use crate::models::selection::Score;
    use crate::store::memory::MemoryStore;
    use crate::testutil::{bucketed_snapshot, date, prompt, FixedClock, StubOracle};
    use chrono::Utc;

    const TODAY: &str = "2025-08-03";

    fn selector(store: &Arc<MemoryStore>, oracle: &Arc<StubOracle>) -> DailySelector {
        DailySelector::new(
            store.clone(),
            store.clone(),
            oracle.clone(),
            Arc::new(FixedClock::on(TODAY)),
        )
        .with_rng(StdRng::seed_from_u64(11))
    }

    fn ranking(selected: i64) -> RankingResult {
        RankingResult {
            selected_prompt_number: selected,
            reason: "Sparks curiosity".to_string(),
            ranked: vec![Score {
                candidate_index: selected.max(0) as u32,
                inspiring: 5,
                appropriate: 5,
                fun: 4,
                total: 14,
            }],
        }
    }

    #[tokio::test]
    async fn test_ranked_pick_is_recorded_with_rationale() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(10)));
        let oracle = Arc::new(StubOracle::answering(ranking(5)));
        let selector = selector(&store, &oracle);

        let picked = selector.select_daily_prompt().await.unwrap().unwrap();

        let shortlist = oracle.last_shortlist().unwrap();
        assert_eq!(shortlist.len(), 32);
        assert_eq!(picked.id, shortlist[4].id);

        let ledger = store.ledger();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].date, date(TODAY));
        assert_eq!(ledger[0].prompt_id, picked.id);
        let details = ledger[0].details.as_ref().unwrap();
        assert_eq!(details.prompt, picked);
        assert_eq!(details.rationale.as_deref(), Some("Sparks curiosity"));
        assert_eq!(details.scores.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back_to_shortlist_member() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(10)));
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        let picked = selector.select_daily_prompt().await.unwrap().unwrap();

        let shortlist = oracle.last_shortlist().unwrap();
        assert!(shortlist.iter().any(|c| c.id == picked.id));
        let details = store.ledger()[0].details.clone().unwrap();
        assert!(details.rationale.is_none());
        assert!(details.scores.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_winner_still_selects() {
        for bad in [0, 33, -4] {
            let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(10)));
            let oracle = Arc::new(StubOracle::answering(ranking(bad)));
            let selector = selector(&store, &oracle);

            let picked = selector.select_daily_prompt().await.unwrap();
            assert!(picked.is_some(), "winner #{bad} must fall back");
            assert!(store.ledger()[0].details.as_ref().unwrap().rationale.is_none());
        }
    }

    #[tokio::test]
    async fn test_empty_shortlist_selects_nothing_and_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        assert!(selector.select_daily_prompt().await.unwrap().is_none());
        assert_eq!(store.ledger_writes(), 0);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_everything_recently_used_selects_nothing() {
        let store = Arc::new(MemoryStore::with_snapshot(vec![prompt(
            "only",
            "Microsoft Copilot",
            PromptType::Text,
        )]));
        store.seed_ledger(vec![SelectionRecord::reference(date("2025-07-20"), "only", Utc::now())]);
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        assert!(selector.select_daily_prompt().await.unwrap().is_none());
        assert_eq!(store.ledger_writes(), 0);
    }

    #[tokio::test]
    async fn test_get_today_twice_is_stable_and_ranks_once() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(10)));
        let oracle = Arc::new(StubOracle::answering(ranking(1)));
        let selector = selector(&store, &oracle);

        let first = selector.get_today_prompt().await.unwrap().unwrap();
        let second = selector.get_today_prompt().await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(oracle.calls(), 1);
        assert_eq!(store.ledger_writes(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_get_today_ranks_once() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(10)));
        let oracle = Arc::new(StubOracle::answering(ranking(2)));
        let selector = selector(&store, &oracle);

        let (first, second) =
            tokio::join!(selector.get_today_prompt(), selector.get_today_prompt());

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(oracle.calls(), 1);
        assert_eq!(store.ledger_writes(), 1);
    }

    #[tokio::test]
    async fn test_recorded_pick_is_served_while_selection_runs() {
        let store = Arc::new(MemoryStore::default());
        let stored = prompt("recorded", "Microsoft Copilot", PromptType::Text);
        store.seed_ledger(vec![SelectionRecord::with_prompt(
            date(TODAY),
            stored.clone(),
            Utc::now(),
            None,
            None,
        )]);
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        // Stands in for a scheduled selection parked inside the oracle call.
        let _busy = selector.selection_lock.lock().await;
        let today = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            selector.get_today_prompt(),
        )
        .await
        .expect("read of an existing pick must not wait for the selection lock")
        .unwrap();
        assert_eq!(today, Some(stored));
    }

    #[tokio::test]
    async fn test_get_today_uses_denormalized_record_only() {
        let store = Arc::new(MemoryStore::default());
        let stored = prompt("archived", "Anthropic Prompt Library", PromptType::Text);
        store.seed_ledger(vec![SelectionRecord::with_prompt(
            date(TODAY),
            stored.clone(),
            Utc::now(),
            Some("Great".to_string()),
            None,
        )]);
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        let today = selector.get_today_prompt().await.unwrap().unwrap();
        assert_eq!(today, stored);
        assert_eq!(store.snapshot_reads(), 0);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_today_resolves_plain_reference_from_snapshots() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(2)));
        store.seed_ledger(vec![SelectionRecord::reference(date(TODAY), "hero-vid-1", Utc::now())]);
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        let today = selector.get_today_prompt().await.unwrap().unwrap();
        assert_eq!(today.id, "hero-vid-1");
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_today_overrides_existing_pick() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(3)));
        let oracle = Arc::new(StubOracle::answering(ranking(1)));
        let selector = selector(&store, &oracle);
        selector.select_daily_prompt().await.unwrap().unwrap();

        let updated = selector.update_today_prompt("anthropic-2").await.unwrap().unwrap();
        assert_eq!(updated.id, "anthropic-2");

        let ledger = store.ledger();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].prompt_id, "anthropic-2");
        assert_eq!(oracle.calls(), 1);
        assert_eq!(selector.get_today_prompt().await.unwrap().unwrap().id, "anthropic-2");
    }

    #[tokio::test]
    async fn test_update_today_with_unknown_id_leaves_ledger_unchanged() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(3)));
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        assert!(selector.update_today_prompt("bad-id").await.unwrap().is_none());
        assert_eq!(store.ledger_writes(), 0);
        assert!(store.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_winner_falls_back_to_surviving_candidate() {
        // The snapshot is replaced between shortlisting and resolving; only
        // two of the shortlisted prompts survive.
        let before = vec![
            prompt("gone-1", "Microsoft Copilot", PromptType::Text),
            prompt("gone-2", "Microsoft Copilot", PromptType::Text),
            prompt("kept-1", "Anthropic Prompt Library", PromptType::Text),
            prompt("kept-2", "PromptHero Veo", PromptType::Video),
        ];
        let after = vec![before[2].clone(), before[3].clone()];
        let store = Arc::new(MemoryStore::with_snapshot_sequence(vec![before, after]));
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        let picked = selector.select_daily_prompt().await.unwrap().unwrap();
        assert!(picked.id.starts_with("kept-"));
        assert_eq!(store.ledger()[0].prompt_id, picked.id);
    }

    #[tokio::test]
    async fn test_nothing_resolvable_selects_nothing() {
        let before = vec![prompt("gone", "Microsoft Copilot", PromptType::Text)];
        let after = vec![prompt("other", "Microsoft Copilot", PromptType::Text)];
        let store = Arc::new(MemoryStore::with_snapshot_sequence(vec![before, after]));
        let oracle = Arc::new(StubOracle::answering(ranking(1)));
        let selector = selector(&store, &oracle);

        assert!(selector.select_daily_prompt().await.unwrap().is_none());
        assert_eq!(store.ledger_writes(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(2)).failing_writes());
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        assert!(selector.select_daily_prompt().await.is_err());
    }

    #[tokio::test]
    async fn test_previous_days_are_untouched_by_todays_selection() {
        let store = Arc::new(MemoryStore::with_snapshot(bucketed_snapshot(10)));
        store.seed_ledger(vec![SelectionRecord::reference(
            date("2025-08-02"),
            "copilot-3",
            Utc::now(),
        )]);
        let oracle = Arc::new(StubOracle::failing());
        let selector = selector(&store, &oracle);

        selector.select_daily_prompt().await.unwrap().unwrap();
        selector.select_daily_prompt().await.unwrap().unwrap();

        let ledger = store.ledger();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].prompt_id, "copilot-3");
        assert_eq!(ledger[1].date, date(TODAY));
        assert!(oracle.last_shortlist().unwrap().iter().all(|c| c.id != "copilot-3"));
    }
}
