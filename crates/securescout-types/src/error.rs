use thiserror::Error;
use uuid::Uuid;

use crate::job::{JobEvent, JobId, JobStatus};

#[derive(Debug, Error)]
pub enum SecureScoutError {
    #[error("State transition error: cannot transition from {from:?} via {event:?}")]
    InvalidStateTransition { from: JobStatus, event: JobEvent },

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Scout not found: {0}")]
    ScoutNotFound(Uuid),

    #[error("Agent not found: {0}")]
    AgentNotFound(Uuid),

    #[error("Account {0} is already registered")]
    AlreadyRegistered(Uuid),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Registry is paused")]
    RegistryPaused,

    #[error("Agent not available: {0}")]
    AgentUnavailable(Uuid),

    #[error("Agent {agent} already applied for job {job_id}")]
    DuplicateApplication { job_id: JobId, agent: Uuid },

    #[error("Agent {agent} has not applied for job {job_id}")]
    AgentNotApplied { job_id: JobId, agent: Uuid },

    #[error("Job {0} is not open for applications")]
    JobNotOpen(JobId),

    #[error("Job {0} is not in progress")]
    JobNotInProgress(JobId),

    #[error("Job {0} has no completion awaiting approval")]
    CompletionNotPending(JobId),

    #[error("Job {0} is not cancelled")]
    JobNotCancelled(JobId),

    #[error("Job {0} has not been completed")]
    JobNotCompleted(JobId),

    #[error("Job budget must be non-zero")]
    EmptyBudget,

    #[error("Insufficient deposit: expected {expected}, got {actual}")]
    InsufficientDeposit { expected: u128, actual: u128 },

    #[error("No escrow held for job {0}")]
    EscrowNotFound(JobId),

    #[error("Escrow already funded for job {0}")]
    EscrowAlreadyFunded(JobId),

    #[error("Payment already released for job {0}")]
    PaymentAlreadyReleased(JobId),

    #[error("Nothing to withdraw for {0}")]
    NothingToWithdraw(Uuid),

    #[error("Rating out of range: {0} (must be 1-5)")]
    RatingOutOfRange(u8),

    #[error("Progress out of range: {0} (must be 0-100)")]
    ProgressOutOfRange(u8),

    #[error("Review already submitted for job {0}")]
    DuplicateReview(JobId),

    #[error("Review not found for job {0}")]
    ReviewNotFound(JobId),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SecureScoutError>;
