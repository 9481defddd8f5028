use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::prompt::Prompt;

/// Per-candidate score breakdown returned by the ranking oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// 1-based position in the shortlist as presented to the oracle.
    #[serde(rename = "promptNumber", alias = "candidateIndex")]
    pub candidate_index: u32,
    pub inspiring: u8,
    pub appropriate: u8,
    pub fun: u8,
    #[serde(default)]
    pub total: u32,
}

/// Denormalized copy of the chosen prompt, plus the oracle's rationale when the
/// ranked path was used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionDetails {
    pub prompt: Prompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<Score>>,
}

/// One ledger entry. `date` is unique within the ledger.
///
/// Records without `details` are plain references written by older deployments;
/// readers resolve them against the prompt snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRecord {
    pub date: NaiveDate,
    pub prompt_id: String,
    pub selected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<SelectionDetails>,
}

impl SelectionRecord {
    /// A plain reference record with no denormalized fields.
    pub fn reference(
        date: NaiveDate,
        prompt_id: impl Into<String>,
        selected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            date,
            prompt_id: prompt_id.into(),
            selected_at,
            details: None,
        }
    }

    pub fn with_prompt(
        date: NaiveDate,
        prompt: Prompt,
        selected_at: DateTime<Utc>,
        rationale: Option<String>,
        scores: Option<Vec<Score>>,
    ) -> Self {
        Self {
            date,
            prompt_id: prompt.id.clone(),
            selected_at,
            details: Some(SelectionDetails {
                prompt,
                rationale,
                scores,
            }),
        }
    }

    /// The prompt as stored in the record, if the record carries one.
    pub fn stored_prompt(&self) -> Option<&Prompt> {
        self.details.as_ref().map(|d| &d.prompt)
    }
}
