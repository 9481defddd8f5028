//! Read-side queries: paginated selection history and the latest-snapshot listing.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::prompt::{Prompt, PromptType};
use crate::models::selection::{Score, SelectionRecord};
use crate::store::{HistoryLedger, PromptStore, StorageError};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_PROMPT_LIMIT: usize = 50;
pub const MAX_PROMPT_LIMIT: usize = 200;

/// A ledger record with its prompt resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub prompt_id: String,
    pub selected_at: DateTime<Utc>,
    pub prompt: Prompt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<Score>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub history: Vec<HistoryEntry>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PromptFilter {
    pub search: Option<String>,
    pub prompt_type: Option<PromptType>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptPage {
    pub prompts: Vec<Prompt>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// Normalises 1-based paging parameters.
pub fn page_params(
    page: Option<usize>,
    limit: Option<usize>,
    default: usize,
    max: usize,
) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default).clamp(1, max);
    (page, limit)
}

fn slice_page<T>(items: Vec<T>, page: usize, limit: usize) -> Vec<T> {
    items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect()
}

/// Selection history, newest first. Plain reference records are resolved
/// against every snapshot and dropped when their prompt no longer exists.
pub async fn history_page(
    prompts: &dyn PromptStore,
    ledger: &dyn HistoryLedger,
    page: usize,
    limit: usize,
) -> Result<HistoryPage, StorageError> {
    let records = ledger.load().await?;

    let index: HashMap<String, Prompt> = if records.iter().any(|r| r.details.is_none()) {
        prompts
            .all_snapshots()
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect()
    } else {
        HashMap::new()
    };

    let mut resolved: Vec<HistoryEntry> = records
        .into_iter()
        .filter_map(|record| resolve_entry(record, &index))
        .collect();
    resolved.sort_by(|a, b| b.date.cmp(&a.date));

    let total = resolved.len();
    Ok(HistoryPage {
        history: slice_page(resolved, page, limit),
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    })
}

fn resolve_entry(record: SelectionRecord, index: &HashMap<String, Prompt>) -> Option<HistoryEntry> {
    let SelectionRecord {
        date,
        prompt_id,
        selected_at,
        details,
    } = record;

    let (prompt, rationale, scores) = match details {
        Some(d) => (d.prompt, d.rationale, d.scores),
        None => (index.get(&prompt_id)?.clone(), None, None),
    };

    Some(HistoryEntry {
        date,
        prompt_id,
        selected_at,
        prompt,
        rationale,
        scores,
    })
}

/// Latest-snapshot listing with optional filters, newest `created_at` first.
pub async fn list_prompts(
    prompts: &dyn PromptStore,
    filter: &PromptFilter,
    page: usize,
    limit: usize,
) -> Result<PromptPage, StorageError> {
    let search = filter.search.as_deref().map(str::to_lowercase);
    let source = filter.source.as_deref().map(str::to_lowercase);

    let mut matching: Vec<Prompt> = prompts
        .latest_snapshot()
        .await?
        .into_iter()
        .filter(|p| match &search {
            Some(term) => {
                p.content.to_lowercase().contains(term) || p.source.to_lowercase().contains(term)
            }
            None => true,
        })
        .filter(|p| filter.prompt_type.map_or(true, |t| p.prompt_type == t))
        .filter(|p| match &source {
            Some(s) => p.source.to_lowercase().contains(s),
            None => true,
        })
        .collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = matching.len();
    Ok(PromptPage {
        prompts: slice_page(matching, page, limit),
        total,
        page,
        limit,
    })
}
