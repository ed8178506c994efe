use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SecureScoutError};
use crate::pas::Pas;

/// Monotonic job identifier minted by the JobRegistry. Never reused.
pub type JobId = u64;

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Open,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

/// Events that drive job state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobEvent {
    AgentAccepted,
    WorkStarted,
    CompletionSubmitted,
    JobCancelled,
    DisputeRaised,
    ResolvedForAgent,
    ResolvedForScout,
}

impl JobStatus {
    /// Attempt a state transition given an event.
    /// Returns the new state or an error if the transition is invalid.
    pub fn transition(self, event: JobEvent) -> Result<JobStatus> {
        match (self, event) {
            // Forward path
            (JobStatus::Open, JobEvent::AgentAccepted) => Ok(JobStatus::Assigned),
            (JobStatus::Assigned, JobEvent::WorkStarted) => Ok(JobStatus::InProgress),
            (JobStatus::InProgress, JobEvent::CompletionSubmitted) => Ok(JobStatus::Completed),

            // The scout can cancel any time before completion is submitted.
            (JobStatus::Open, JobEvent::JobCancelled)
            | (JobStatus::Assigned, JobEvent::JobCancelled)
            | (JobStatus::InProgress, JobEvent::JobCancelled) => Ok(JobStatus::Cancelled),

            // Either party can dispute from any non-terminal state.
            (JobStatus::Open, JobEvent::DisputeRaised)
            | (JobStatus::Assigned, JobEvent::DisputeRaised)
            | (JobStatus::InProgress, JobEvent::DisputeRaised)
            | (JobStatus::Completed, JobEvent::DisputeRaised) => Ok(JobStatus::Disputed),

            // Owner settlement of a frozen dispute.
            (JobStatus::Disputed, JobEvent::ResolvedForAgent) => Ok(JobStatus::Completed),
            (JobStatus::Disputed, JobEvent::ResolvedForScout) => Ok(JobStatus::Cancelled),

            (state, event) => Err(SecureScoutError::InvalidStateTransition { from: state, event }),
        }
    }
}

/// A posted job request and everything that accrues to it over its life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub scout: Uuid,
    pub assigned_agent: Option<Uuid>,
    pub preferred_agent: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub budget: Pas,
    /// Mirror of the PaymentRegistry's escrow balance for this job.
    pub escrow_amount: Pas,
    pub status: JobStatus,
    pub progress: u8,
    pub applicants: Vec<Uuid>,
    pub deliverables: Option<String>,
    pub proof_urls: Vec<String>,
    pub dispute_reason: Option<String>,
    pub is_completed: bool,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stored and surfaced; expiry is not enforced automatically.
    pub deadline: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        id: JobId,
        scout: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        location: impl Into<String>,
        budget: Pas,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            scout,
            assigned_agent: None,
            preferred_agent: None,
            title: title.into(),
            description: description.into(),
            location: location.into(),
            budget,
            escrow_amount: 0,
            status: JobStatus::Open,
            progress: 0,
            applicants: Vec::new(),
            deliverables: None,
            proof_urls: Vec::new(),
            dispute_reason: None,
            is_completed: false,
            is_paid: false,
            created_at: now,
            updated_at: now,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_preferred_agent(mut self, agent: Option<Uuid>) -> Self {
        self.preferred_agent = agent;
        self
    }

    /// Apply a state transition event.
    pub fn apply_event(&mut self, event: JobEvent) -> Result<()> {
        self.status = self.status.transition(event)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_scout(&self, account: Uuid) -> bool {
        self.scout == account
    }

    pub fn is_assigned_agent(&self, account: Uuid) -> bool {
        self.assigned_agent == Some(account)
    }

    /// Whether the account is one of the two parties to this job.
    pub fn is_party(&self, account: Uuid) -> bool {
        self.is_scout(account) || self.is_assigned_agent(account)
    }

    pub fn has_applicant(&self, agent: Uuid) -> bool {
        self.applicants.contains(&agent)
    }
}
