//! Persistence for prompt snapshots and the selection ledger.
//!
//! Two contracts, `PromptStore` and `HistoryLedger`, each implemented by the
//! filesystem backend (`fs`) and the object-store backend (`s3`). Key layout and
//! the ledger merge rule live here so both backends agree on them.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::prompt::Prompt;
use crate::models::selection::SelectionRecord;

pub mod fs;
#[cfg(test)]
pub mod memory;
pub mod s3;

pub const SNAPSHOT_PREFIX: &str = "prompts-";
pub const SNAPSHOT_SUFFIX: &str = ".json";
pub const LEDGER_FILE: &str = "history.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON in {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid snapshot tag: {0:?}")]
    InvalidTag(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),
}

/// Append-only, dated snapshots of collected prompts.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Contents of the snapshot with the greatest tag, or empty if none exist.
    async fn latest_snapshot(&self) -> Result<Vec<Prompt>, StorageError>;

    /// Every snapshot concatenated. Order within a snapshot is preserved.
    async fn all_snapshots(&self) -> Result<Vec<Prompt>, StorageError>;

    /// Writes (or overwrites) the snapshot stored under `tag`.
    async fn write_snapshot(&self, prompts: &[Prompt], tag: &str) -> Result<(), StorageError>;
}

/// Date-keyed history of daily selections.
#[async_trait]
pub trait HistoryLedger: Send + Sync {
    /// All records, ascending by date.
    async fn load(&self) -> Result<Vec<SelectionRecord>, StorageError>;

    /// Replaces any record for `record.date` and persists the whole ledger atomically.
    async fn upsert(&self, record: SelectionRecord) -> Result<(), StorageError>;

    async fn find_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<SelectionRecord>, StorageError> {
        Ok(self.load().await?.into_iter().find(|r| r.date == date))
    }
}

/// Drops any record sharing `record.date`, appends `record`, and sorts ascending by date.
pub fn merge_record(
    mut ledger: Vec<SelectionRecord>,
    record: SelectionRecord,
) -> Vec<SelectionRecord> {
    ledger.retain(|existing| existing.date != record.date);
    ledger.push(record);
    ledger.sort_by(|a, b| a.date.cmp(&b.date));
    ledger
}

/// Tags become part of a file name or object key, so only a conservative
/// character set is accepted.
pub fn validate_tag(tag: &str) -> Result<(), StorageError> {
    let valid = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidTag(tag.to_string()))
    }
}

pub fn snapshot_name(tag: &str) -> String {
    format!("{SNAPSHOT_PREFIX}{tag}{SNAPSHOT_SUFFIX}")
}

/// Extracts the tag from a snapshot file name, e.g. `prompts-2025-08-03.json`.
pub fn tag_from_name(name: &str) -> Option<&str> {
    name.strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)
        .filter(|tag| !tag.is_empty())
}

/// Greatest tag by string comparison.
pub fn latest_tag<'a>(tags: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    tags.into_iter().max()
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    key: &str,
    bytes: &[u8],
) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn encode<T: serde::Serialize + ?Sized>(
    key: &str,
    value: &T,
) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })
}
