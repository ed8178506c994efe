use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entry::{LedgerEntry, LedgerEntryKind};
use crate::traits::Ledger;
use securescout_types::{JobId, SecureScoutError};

/// In-memory ledger implementation (default).
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
    index_by_job: Arc<DashMap<JobId, Vec<usize>>>,
    index_by_actor: Arc<DashMap<Uuid, Vec<usize>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            index_by_id: Arc::new(DashMap::new()),
            index_by_job: Arc::new(DashMap::new()),
            index_by_actor: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<(), SecureScoutError> {
        let mut entries = self.entries.write().await;
        let idx = entries.len();

        self.index_by_id.insert(entry.id, idx);
        if let Some(job_id) = entry.job_id {
            self.index_by_job.entry(job_id).or_default().push(idx);
        }
        self.index_by_actor.entry(entry.actor).or_default().push(idx);

        entries.push(entry);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<LedgerEntry>, SecureScoutError> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_id
            .get(&id)
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn latest_hash(&self) -> Result<Option<String>, SecureScoutError> {
        let entries = self.entries.read().await;
        Ok(entries.last().map(|e| e.hash.clone()))
    }

    async fn entries_for_job(
        &self,
        job_id: JobId,
    ) -> Result<Vec<LedgerEntry>, SecureScoutError> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_job
            .get(&job_id)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn entries_for_actor(&self, actor: Uuid) -> Result<Vec<LedgerEntry>, SecureScoutError> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_actor
            .get(&actor)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn entries_of_kind(
        &self,
        kind: LedgerEntryKind,
    ) -> Result<Vec<LedgerEntry>, SecureScoutError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.kind == kind).cloned().collect())
    }

    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, SecureScoutError> {
        let entries = self.entries.read().await;
        Ok(entries.clone())
    }

    async fn verify_integrity(&self) -> Result<bool, SecureScoutError> {
        let entries = self.entries.read().await;
        for (i, entry) in entries.iter().enumerate() {
            if i == 0 {
                if entry.previous_hash.is_some() {
                    return Ok(false);
                }
            } else if entry.previous_hash.as_ref() != Some(&entries[i - 1].hash) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
