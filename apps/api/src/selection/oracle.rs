//! Ranking Oracle Client — asks the LLM to score the shortlist and name a winner.
//!
//! Every failure (missing key, transport error, non-2xx, malformed JSON, an
//! out-of-range winner) is absorbed here: `rank` returns `None` and the
//! orchestrator falls back to a random pick.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::prompt::ShortlistedPrompt;
use crate::models::selection::Score;
use crate::selection::prompts::{RANKING_PROMPT_TEMPLATE, RANKING_SYSTEM};

/// Characters of prompt content shown to the oracle per candidate.
pub const PREVIEW_CHARS: usize = 200;

/// Structured answer from the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResult {
    pub selected_prompt_number: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub ranked: Vec<Score>,
}

impl RankingResult {
    /// 0-based shortlist index of the winner, or `None` when outside `1..=count`.
    pub fn selected_index(&self, count: usize) -> Option<usize> {
        usize::try_from(self.selected_prompt_number)
            .ok()
            .filter(|n| (1..=count).contains(n))
            .map(|n| n - 1)
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Nothing to rank")]
    EmptyShortlist,

    #[error("Selected prompt #{selected} is outside 1..={count}")]
    SelectionOutOfRange { selected: i64, count: usize },
}

/// Scores a shortlist. `None` means "no usable ranking"; callers fall back.
#[async_trait]
pub trait RankingOracle: Send + Sync {
    async fn rank(&self, candidates: &[ShortlistedPrompt]) -> Option<RankingResult>;
}

pub struct LlmRankingOracle {
    llm: LlmClient,
}

impl LlmRankingOracle {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    async fn try_rank(
        &self,
        candidates: &[ShortlistedPrompt],
    ) -> Result<RankingResult, OracleError> {
        if candidates.is_empty() {
            return Err(OracleError::EmptyShortlist);
        }
        let prompt = build_ranking_prompt(candidates);
        let system = format!("{RANKING_SYSTEM}\n\n{JSON_ONLY_SYSTEM}");
        let result: RankingResult = self.llm.call_json(&prompt, &system).await?;
        validate_ranking(result, candidates.len())
    }
}

#[async_trait]
impl RankingOracle for LlmRankingOracle {
    async fn rank(&self, candidates: &[ShortlistedPrompt]) -> Option<RankingResult> {
        match self.try_rank(candidates).await {
            Ok(result) => {
                info!(
                    "Oracle selected #{} of {}: {}",
                    result.selected_prompt_number,
                    candidates.len(),
                    result.reason
                );
                Some(result)
            }
            Err(e) => {
                warn!("Ranking oracle unavailable: {e}");
                None
            }
        }
    }
}

/// Numbered candidate list (1-based) with truncated previews.
pub fn build_ranking_prompt(candidates: &[ShortlistedPrompt]) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. {} (Source: {}, Type: {})",
                i + 1,
                preview(&c.content),
                c.source,
                c.prompt_type.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    RANKING_PROMPT_TEMPLATE
        .replace("{count}", &candidates.len().to_string())
        .replace("{candidates}", &listing)
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Rejects an out-of-range winner. Score rows survive only if they name a
/// candidate, rate each criterion 1-5 and carry the matching total; an omitted
/// total is filled in.
pub fn validate_ranking(
    mut result: RankingResult,
    count: usize,
) -> Result<RankingResult, OracleError> {
    if result.selected_index(count).is_none() {
        return Err(OracleError::SelectionOutOfRange {
            selected: result.selected_prompt_number,
            count,
        });
    }
    let before = result.ranked.len();
    for score in result.ranked.iter_mut().filter(|s| s.total == 0) {
        score.total = criteria_sum(score);
    }
    result.ranked.retain(|s| score_is_valid(s, count));
    if result.ranked.len() != before {
        debug!("Discarded {} invalid score rows", before - result.ranked.len());
    }
    Ok(result)
}

fn criteria_sum(score: &Score) -> u32 {
    u32::from(score.inspiring) + u32::from(score.appropriate) + u32::from(score.fun)
}

fn score_is_valid(score: &Score, count: usize) -> bool {
    let rated = [score.inspiring, score.appropriate, score.fun]
        .iter()
        .all(|v| (1..=5).contains(v));
    (1..=count).contains(&(score.candidate_index as usize))
        && rated
        && score.total == criteria_sum(score)
}
