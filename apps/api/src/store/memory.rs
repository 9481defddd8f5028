//! In-memory store with access counters, used by the orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::prompt::Prompt;
use crate::models::selection::SelectionRecord;
use crate::store::{merge_record, HistoryLedger, PromptStore, StorageError};

#[derive(Default)]
pub struct MemoryStore {
    /// Successive `latest_snapshot` results; the last one repeats once the queue drains.
    snapshots: Mutex<Vec<Vec<Prompt>>>,
    written: Mutex<Vec<(String, Vec<Prompt>)>>,
    ledger: Mutex<Vec<SelectionRecord>>,
    snapshot_reads: AtomicUsize,
    ledger_writes: AtomicUsize,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn with_snapshot(prompts: Vec<Prompt>) -> Self {
        Self {
            snapshots: Mutex::new(vec![prompts]),
            ..Default::default()
        }
    }

    /// Queue of snapshots returned by consecutive `latest_snapshot` calls.
    pub fn with_snapshot_sequence(sequence: Vec<Vec<Prompt>>) -> Self {
        Self {
            snapshots: Mutex::new(sequence),
            ..Default::default()
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn seed_ledger(&self, records: Vec<SelectionRecord>) {
        *self.ledger.lock().unwrap() = records;
    }

    pub fn ledger(&self) -> Vec<SelectionRecord> {
        self.ledger.lock().unwrap().clone()
    }

    pub fn written(&self) -> Vec<(String, Vec<Prompt>)> {
        self.written.lock().unwrap().clone()
    }

    pub fn snapshot_reads(&self) -> usize {
        self.snapshot_reads.load(Ordering::SeqCst)
    }

    pub fn ledger_writes(&self) -> usize {
        self.ledger_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromptStore for MemoryStore {
    async fn latest_snapshot(&self) -> Result<Vec<Prompt>, StorageError> {
        self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        let current = if snapshots.len() > 1 {
            snapshots.remove(0)
        } else {
            snapshots.first().cloned().unwrap_or_default()
        };
        Ok(current)
    }

    async fn all_snapshots(&self) -> Result<Vec<Prompt>, StorageError> {
        self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
        let mut all: Vec<Prompt> = self.snapshots.lock().unwrap().concat();
        for (_, prompts) in self.written.lock().unwrap().iter() {
            all.extend(prompts.iter().cloned());
        }
        Ok(all)
    }

    async fn write_snapshot(&self, prompts: &[Prompt], tag: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::ObjectStore("write refused".to_string()));
        }
        self.written
            .lock()
            .unwrap()
            .push((tag.to_string(), prompts.to_vec()));
        Ok(())
    }
}

#[async_trait]
impl HistoryLedger for MemoryStore {
    async fn load(&self) -> Result<Vec<SelectionRecord>, StorageError> {
        Ok(self.ledger.lock().unwrap().clone())
    }

    async fn upsert(&self, record: SelectionRecord) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::ObjectStore("write refused".to_string()));
        }
        self.ledger_writes.fetch_add(1, Ordering::SeqCst);
        let mut ledger = self.ledger.lock().unwrap();
        let merged = merge_record(std::mem::take(&mut *ledger), record);
        *ledger = merged;
        Ok(())
    }
}
