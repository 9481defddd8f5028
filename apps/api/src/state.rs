use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::crawl::PromptSource;
use crate::schedule::SchedulePolicy;
use crate::selection::orchestrator::DailySelector;
use crate::store::{HistoryLedger, PromptStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub selector: Arc<DailySelector>,
    /// Same backend the selector reads; exposed for history and gallery reads.
    pub prompts: Arc<dyn PromptStore>,
    pub ledger: Arc<dyn HistoryLedger>,
    pub sources: Arc<Vec<Arc<dyn PromptSource>>>,
    pub clock: Arc<dyn Clock>,
    pub schedule: SchedulePolicy,
    pub config: Config,
}
