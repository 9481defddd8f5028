//! Crawl trigger — collects prompts from every configured source and stores
//! them as one dated snapshot.
//!
//! Sources run one after another. A failing source is reported in its
//! `SourceResult` and never discards what the other sources returned.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::clock::Clock;
use crate::models::prompt::Prompt;
use crate::store::{PromptStore, StorageError};

pub mod feed;
pub mod handlers;

/// An external collaborator that yields prompts for one site.
#[async_trait]
pub trait PromptSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> anyhow::Result<Vec<Prompt>>;
}

/// Outcome of crawling a single source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceResult {
    pub source: String,
    pub success: bool,
    pub count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub prompts_found: usize,
    /// Tag of the snapshot written, if any prompts were collected.
    pub snapshot_tag: Option<String>,
    pub results: Vec<SourceResult>,
    pub timestamp: DateTime<Utc>,
}

/// Crawls every source, merging successes and recording failures.
pub async fn crawl_all(sources: &[Arc<dyn PromptSource>]) -> (Vec<Prompt>, Vec<SourceResult>) {
    let mut prompts = Vec::new();
    let mut results = Vec::with_capacity(sources.len());

    for source in sources {
        match source.fetch().await {
            Ok(found) => {
                info!("{}: {} prompts", source.name(), found.len());
                results.push(SourceResult {
                    source: source.name().to_string(),
                    success: true,
                    count: found.len(),
                    error: None,
                });
                prompts.extend(found);
            }
            Err(e) => {
                error!("Failed to crawl {}: {e:#}", source.name());
                results.push(SourceResult {
                    source: source.name().to_string(),
                    success: false,
                    count: 0,
                    error: Some(format!("{e:#}")),
                });
            }
        }
    }

    (prompts, results)
}

/// Runs a crawl and, when anything was collected, writes it under today's tag.
pub async fn trigger_crawl(
    store: &dyn PromptStore,
    sources: &[Arc<dyn PromptSource>],
    clock: &dyn Clock,
) -> Result<CrawlReport, StorageError> {
    let started = clock.now();
    let (prompts, results) = crawl_all(sources).await;

    let snapshot_tag = if prompts.is_empty() {
        info!("No prompts collected; latest snapshot unchanged");
        None
    } else {
        let tag = clock.today().format("%Y-%m-%d").to_string();
        store.write_snapshot(&prompts, &tag).await?;
        Some(tag)
    };

    let elapsed = (clock.now() - started).num_milliseconds();
    info!(
        "Crawl finished: {} prompts from {} sources in {elapsed}ms",
        prompts.len(),
        sources.len()
    );

    Ok(CrawlReport {
        prompts_found: prompts.len(),
        snapshot_tag,
        results,
        timestamp: clock.now(),
    })
}
