//! Admin routes: manual crawl trigger and scheduler status.

use axum::{extract::State, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::crawl::{trigger_crawl, CrawlReport};
use crate::errors::AppError;
use crate::schedule::ScheduleEntry;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub scheduler_enabled: bool,
    pub timezone: &'static str,
    pub today: NaiveDate,
    pub schedules: Vec<ScheduleEntry>,
    pub source_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/v1/admin/crawl
pub async fn handle_trigger_crawl(
    State(state): State<AppState>,
) -> Result<Json<CrawlReport>, AppError> {
    let report = trigger_crawl(state.prompts.as_ref(), &state.sources, state.clock.as_ref()).await?;
    Ok(Json(report))
}

/// GET /api/v1/admin/status
pub async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let now = state.clock.now();
    Json(StatusResponse {
        scheduler_enabled: state.config.enable_scheduler,
        timezone: state.schedule.tz.name(),
        today: state.clock.today(),
        schedules: state.schedule.entries(now),
        source_count: state.sources.len(),
        timestamp: now,
    })
}
