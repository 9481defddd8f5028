//! Filesystem backend: one JSON file per snapshot plus `history.json`.
//!
//! Writes land in a temp file inside the data directory and are renamed into
//! place, so readers never see a half-written snapshot or ledger.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::prompt::Prompt;
use crate::models::selection::SelectionRecord;
use crate::store::{
    decode, encode, latest_tag, merge_record, snapshot_name, tag_from_name, validate_tag,
    HistoryLedger, PromptStore, StorageError, LEDGER_FILE,
};

pub struct FsStore {
    data_dir: PathBuf,
    /// Serialises ledger read-modify-write cycles.
    ledger_lock: Mutex<()>,
}

impl FsStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ledger_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Snapshot tags present on disk, ascending.
    async fn snapshot_tags(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tags = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(tag) = entry.file_name().to_str().and_then(tag_from_name) {
                tags.push(tag.to_string());
            }
        }
        tags.sort();
        Ok(tags)
    }

    /// Reads a file, treating a missing file as `None`.
    async fn read_optional(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.data_dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_snapshot(&self, tag: &str) -> Result<Vec<Prompt>, StorageError> {
        let name = snapshot_name(tag);
        match self.read_optional(&name).await? {
            Some(bytes) => decode(&name, &bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn write_atomic(&self, name: String, bytes: Vec<u8>) -> Result<(), StorageError> {
        let dir = self.data_dir.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(dir.join(&name)).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

#[async_trait]
impl PromptStore for FsStore {
    async fn latest_snapshot(&self) -> Result<Vec<Prompt>, StorageError> {
        let tags = self.snapshot_tags().await?;
        match latest_tag(tags.iter().map(String::as_str)) {
            Some(tag) => {
                debug!("Reading latest snapshot {tag}");
                self.read_snapshot(tag).await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn all_snapshots(&self) -> Result<Vec<Prompt>, StorageError> {
        let mut all = Vec::new();
        for tag in self.snapshot_tags().await? {
            match self.read_snapshot(&tag).await {
                Ok(prompts) => all.extend(prompts),
                Err(e @ StorageError::Serialization { .. }) => {
                    warn!("Skipping unreadable snapshot {tag}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(all)
    }

    async fn write_snapshot(&self, prompts: &[Prompt], tag: &str) -> Result<(), StorageError> {
        validate_tag(tag)?;
        let name = snapshot_name(tag);
        let bytes = encode(&name, prompts)?;
        self.write_atomic(name, bytes).await?;
        info!(
            "Wrote snapshot {tag} ({} prompts) to {}",
            prompts.len(),
            self.data_dir.display()
        );
        Ok(())
    }
}

#[async_trait]
impl HistoryLedger for FsStore {
    async fn load(&self) -> Result<Vec<SelectionRecord>, StorageError> {
        match self.read_optional(LEDGER_FILE).await? {
            Some(bytes) => decode(LEDGER_FILE, &bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn upsert(&self, record: SelectionRecord) -> Result<(), StorageError> {
        let _guard = self.ledger_lock.lock().await;
        let date = record.date;
        let ledger = merge_record(self.load().await?, record);
        let bytes = encode(LEDGER_FILE, &ledger)?;
        self.write_atomic(LEDGER_FILE.to_string(), bytes).await?;
        debug!("Ledger upserted for {date} ({} records)", ledger.len());
        Ok(())
    }
}
