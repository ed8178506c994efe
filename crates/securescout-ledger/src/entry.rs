use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use securescout_types::JobId;

/// Types of ledger entries, one per marketplace event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LedgerEntryKind {
    ScoutRegistered,
    AgentRegistered,
    AgentAvailabilityChanged,
    AgentPriceUpdated,
    AgentLocationUpdated,
    JobPosted,
    JobApplication,
    JobAssigned,
    JobStarted,
    JobProgressUpdated,
    JobCompletionSubmitted,
    JobApproved,
    JobCancelled,
    JobDisputed,
    DisputeResolved,
    FundsDeposited,
    PaymentReleased,
    PaymentRefunded,
    EarningsWithdrawn,
    PlatformFeesWithdrawn,
    EmergencyWithdrawal,
    AgentRated,
    ScoutRated,
    ReviewUpdated,
    RegistryPaused,
    RegistryUnpaused,
}

/// An immutable, hash-chained audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub kind: LedgerEntryKind,
    pub timestamp: DateTime<Utc>,
    /// The account that caused the event.
    pub actor: Uuid,
    /// The job the event concerns, when there is one.
    pub job_id: Option<JobId>,
    pub payload: serde_json::Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl LedgerEntry {
    pub fn new(
        kind: LedgerEntryKind,
        actor: Uuid,
        job_id: Option<JobId>,
        payload: serde_json::Value,
        previous_hash: Option<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();

        let hash_input = format!(
            "{}:{}:{:?}:{}:{}:{}:{}",
            id,
            timestamp.timestamp_nanos_opt().unwrap_or(0),
            kind,
            actor,
            job_id.map(|j| j.to_string()).unwrap_or_default(),
            payload,
            previous_hash.as_deref().unwrap_or("genesis"),
        );

        // Simple hash using std — the merkle feature provides stronger hashing.
        let hash = format!("{:x}", fnv1a_hash(hash_input.as_bytes()));

        Self {
            id,
            kind,
            timestamp,
            actor,
            job_id,
            payload,
            previous_hash,
            hash,
        }
    }
}

/// A simple non-cryptographic hash for the default (non-merkle) ledger.
fn fnv1a_hash(data: &[u8]) -> u128 {
    let mut h: u128 = 0xcbf29ce484222325;
    for &b in data {
        h = h.wrapping_mul(0x100000001b3);
        h ^= b as u128;
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_entry_creation() {
        let entry = LedgerEntry::new(
            LedgerEntryKind::JobPosted,
            Uuid::new_v4(),
            Some(1),
            serde_json::json!({"budget": "10"}),
            None,
        );
        assert!(!entry.hash.is_empty());
        assert!(entry.previous_hash.is_none());
        assert_eq!(entry.job_id, Some(1));
    }

    #[test]
    fn test_chained_entries() {
        let first = LedgerEntry::new(
            LedgerEntryKind::JobPosted,
            Uuid::new_v4(),
            Some(1),
            serde_json::json!({}),
            None,
        );
        let second = LedgerEntry::new(
            LedgerEntryKind::JobAssigned,
            Uuid::new_v4(),
            Some(1),
            serde_json::json!({}),
            Some(first.hash.clone()),
        );
        assert_eq!(second.previous_hash.as_ref().unwrap(), &first.hash);
    }

    #[test]
    fn test_entries_without_job_subject() {
        let entry = LedgerEntry::new(
            LedgerEntryKind::ScoutRegistered,
            Uuid::new_v4(),
            None,
            serde_json::json!({"display_name": "ada"}),
            None,
        );
        assert!(entry.job_id.is_none());
    }
}
