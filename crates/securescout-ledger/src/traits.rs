use async_trait::async_trait;
use uuid::Uuid;

use crate::entry::{LedgerEntry, LedgerEntryKind};
use securescout_types::{JobId, SecureScoutError};

/// Core ledger trait — all ledger implementations must satisfy this.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append an entry to the ledger.
    async fn append(&self, entry: LedgerEntry) -> Result<(), SecureScoutError>;

    /// Get an entry by its ID.
    async fn get(&self, id: Uuid) -> Result<Option<LedgerEntry>, SecureScoutError>;

    /// Get the latest entry hash (for chaining).
    async fn latest_hash(&self) -> Result<Option<String>, SecureScoutError>;

    /// Query entries concerning a job.
    async fn entries_for_job(&self, job_id: JobId)
    -> Result<Vec<LedgerEntry>, SecureScoutError>;

    /// Query entries caused by an account.
    async fn entries_for_actor(&self, actor: Uuid)
    -> Result<Vec<LedgerEntry>, SecureScoutError>;

    /// Query entries by kind.
    async fn entries_of_kind(
        &self,
        kind: LedgerEntryKind,
    ) -> Result<Vec<LedgerEntry>, SecureScoutError>;

    /// Get all entries (for auditing).
    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, SecureScoutError>;

    /// Verify the chain integrity.
    async fn verify_integrity(&self) -> Result<bool, SecureScoutError>;
}

/// Chain a new entry onto a ledger, fetching the previous hash first.
pub async fn append_chained(
    ledger: &dyn Ledger,
    kind: LedgerEntryKind,
    actor: Uuid,
    job_id: Option<JobId>,
    payload: serde_json::Value,
) -> Result<(), SecureScoutError> {
    let previous_hash = ledger.latest_hash().await?;
    let entry = LedgerEntry::new(kind, actor, job_id, payload, previous_hash);
    ledger.append(entry).await
}
