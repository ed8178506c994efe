use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use securescout_ledger::{Ledger, LedgerEntryKind, append_chained};
use securescout_types::{Job, JobEvent, JobId, JobStatus, Pas, Result, SecureScoutError};
use securescout_users::UserRegistry;

/// Everything needed to post a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostJobRequest {
    pub title: String,
    pub description: String,
    pub location: String,
    pub budget: Pas,
    #[serde(default)]
    pub preferred_agent: Option<Uuid>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Owns the job lifecycle state machine. Role checks go through the
/// UserRegistry; escrow bookkeeping lives in the PaymentRegistry, with
/// `Job::escrow_amount` kept as a read-side mirror.
pub struct JobRegistry {
    owner: Uuid,
    paused: AtomicBool,
    jobs: DashMap<JobId, Job>,
    next_job_id: AtomicU64,
    scout_jobs: DashMap<Uuid, Vec<JobId>>,
    agent_jobs: DashMap<Uuid, Vec<JobId>>,
    users: Arc<UserRegistry>,
    ledger: Arc<dyn Ledger>,
}

impl JobRegistry {
    pub fn new(owner: Uuid, users: Arc<UserRegistry>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            owner,
            paused: AtomicBool::new(false),
            jobs: DashMap::new(),
            next_job_id: AtomicU64::new(0),
            scout_jobs: DashMap::new(),
            agent_jobs: DashMap::new(),
            users,
            ledger,
        }
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_paused() {
            return Err(SecureScoutError::RegistryPaused);
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: Uuid) -> Result<()> {
        if caller != self.owner {
            return Err(SecureScoutError::NotAuthorized(format!(
                "{caller} is not the registry owner"
            )));
        }
        Ok(())
    }

    /// Post a new job. Caller must be a registered scout; the budget is
    /// escrowed at posting time (the deposit itself is recorded by the
    /// PaymentRegistry).
    pub async fn post_job(&self, caller: Uuid, request: PostJobRequest) -> Result<Job> {
        self.ensure_active()?;
        if !self.users.is_scout(caller) {
            return Err(SecureScoutError::NotAuthorized(format!(
                "{caller} is not a registered scout"
            )));
        }
        if request.budget == 0 {
            return Err(SecureScoutError::EmptyBudget);
        }

        let id = self.next_job_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut job = Job::new(
            id,
            caller,
            request.title,
            request.description,
            request.location,
            request.budget,
        )
        .with_deadline(request.deadline)
        .with_preferred_agent(request.preferred_agent);
        job.escrow_amount = request.budget;

        self.scout_jobs.entry(caller).or_default().push(id);
        self.jobs.insert(id, job.clone());
        self.users.record_job_posted(caller)?;

        info!(job = id, scout = %caller, budget = %job.budget, "job posted");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobPosted,
            caller,
            Some(id),
            serde_json::json!({
                "title": job.title,
                "location": job.location,
                "budget": job.budget.to_string(),
                "preferred_agent": job.preferred_agent,
            }),
        )
        .await?;

        Ok(job)
    }

    /// Apply for an open job. Caller must be a registered, available agent.
    pub async fn apply_for_job(&self, caller: Uuid, job_id: JobId) -> Result<()> {
        self.ensure_active()?;
        let agent = self.users.get_agent(caller).map_err(|_| {
            SecureScoutError::NotAuthorized(format!("{caller} is not a registered agent"))
        })?;
        if !agent.is_available || !agent.is_active {
            return Err(SecureScoutError::AgentUnavailable(caller));
        }

        {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if job.status != JobStatus::Open {
                return Err(SecureScoutError::JobNotOpen(job_id));
            }
            if job.has_applicant(caller) {
                return Err(SecureScoutError::DuplicateApplication {
                    job_id,
                    agent: caller,
                });
            }
            job.applicants.push(caller);
            job.updated_at = Utc::now();
        }

        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobApplication,
            caller,
            Some(job_id),
            serde_json::json!({}),
        )
        .await
    }

    /// Select an agent for an open job. Scout only; the candidate must
    /// have applied, or be the job's preferred agent.
    pub async fn accept_agent(&self, caller: Uuid, job_id: JobId, agent_id: Uuid) -> Result<Job> {
        self.ensure_active()?;

        let agent = self.users.get_agent(agent_id)?;
        if !agent.is_available || !agent.is_active {
            return Err(SecureScoutError::AgentUnavailable(agent_id));
        }

        let job = {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if !job.is_scout(caller) {
                return Err(SecureScoutError::NotAuthorized(format!(
                    "only the posting scout can accept an agent for job {job_id}"
                )));
            }
            if !job.has_applicant(agent_id) && job.preferred_agent != Some(agent_id) {
                return Err(SecureScoutError::AgentNotApplied {
                    job_id,
                    agent: agent_id,
                });
            }
            job.apply_event(JobEvent::AgentAccepted)?;
            job.assigned_agent = Some(agent_id);
            job.clone()
        };

        self.agent_jobs.entry(agent_id).or_default().push(job_id);

        info!(job = job_id, agent = %agent_id, "agent assigned");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobAssigned,
            caller,
            Some(job_id),
            serde_json::json!({"agent": agent_id}),
        )
        .await?;

        Ok(job)
    }

    /// Start work on an assigned job. Assigned agent only.
    pub async fn start_job(&self, caller: Uuid, job_id: JobId) -> Result<Job> {
        self.ensure_active()?;
        let job = {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if !job.is_assigned_agent(caller) {
                return Err(SecureScoutError::NotAuthorized(format!(
                    "only the assigned agent can start job {job_id}"
                )));
            }
            job.apply_event(JobEvent::WorkStarted)?;
            job.clone()
        };

        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobStarted,
            caller,
            Some(job_id),
            serde_json::json!({}),
        )
        .await?;

        Ok(job)
    }

    /// Report progress on a running job. Assigned agent only; progress is
    /// 0-100 and deliberately not required to be monotonic.
    pub async fn update_progress(
        &self,
        caller: Uuid,
        job_id: JobId,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<()> {
        self.ensure_active()?;
        if progress > 100 {
            return Err(SecureScoutError::ProgressOutOfRange(progress));
        }

        {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if !job.is_assigned_agent(caller) {
                return Err(SecureScoutError::NotAuthorized(format!(
                    "only the assigned agent can report progress on job {job_id}"
                )));
            }
            if job.status != JobStatus::InProgress {
                return Err(SecureScoutError::JobNotInProgress(job_id));
            }
            job.progress = progress;
            job.updated_at = Utc::now();
        }

        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobProgressUpdated,
            caller,
            Some(job_id),
            serde_json::json!({"progress": progress, "message": message.into()}),
        )
        .await
    }

    /// Submit completion with proof URLs and a deliverables description.
    /// Assigned agent only; moves the job to Completed pending approval.
    pub async fn submit_completion(
        &self,
        caller: Uuid,
        job_id: JobId,
        deliverables: impl Into<String>,
        proof_urls: Vec<String>,
    ) -> Result<Job> {
        self.ensure_active()?;
        let deliverables = deliverables.into();
        let job = {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if !job.is_assigned_agent(caller) {
                return Err(SecureScoutError::NotAuthorized(format!(
                    "only the assigned agent can submit completion for job {job_id}"
                )));
            }
            job.apply_event(JobEvent::CompletionSubmitted)?;
            job.progress = 100;
            job.is_completed = true;
            job.deliverables = Some(deliverables.clone());
            job.proof_urls = proof_urls.clone();
            job.clone()
        };

        info!(job = job_id, agent = %caller, proofs = proof_urls.len(), "completion submitted");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobCompletionSubmitted,
            caller,
            Some(job_id),
            serde_json::json!({"deliverables": deliverables, "proof_urls": proof_urls}),
        )
        .await?;

        Ok(job)
    }

    /// Approve a submitted completion. Posting scout only. Marks the job
    /// paid; the actual payment release is the PaymentRegistry's.
    pub async fn approve_completion(&self, caller: Uuid, job_id: JobId) -> Result<Job> {
        self.ensure_active()?;
        let job = {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if !job.is_scout(caller) {
                return Err(SecureScoutError::NotAuthorized(format!(
                    "only the posting scout can approve job {job_id}"
                )));
            }
            if job.status != JobStatus::Completed {
                return Err(SecureScoutError::CompletionNotPending(job_id));
            }
            if job.is_paid {
                return Err(SecureScoutError::PaymentAlreadyReleased(job_id));
            }
            job.is_paid = true;
            job.escrow_amount = 0;
            job.updated_at = Utc::now();
            job.clone()
        };

        info!(job = job_id, "completion approved");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobApproved,
            caller,
            Some(job_id),
            serde_json::json!({}),
        )
        .await?;

        Ok(job)
    }

    /// Cancel a job before completion is submitted. Posting scout only;
    /// the escrow refund is the PaymentRegistry's.
    pub async fn cancel_job(&self, caller: Uuid, job_id: JobId) -> Result<Job> {
        self.ensure_active()?;
        let job = {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if !job.is_scout(caller) {
                return Err(SecureScoutError::NotAuthorized(format!(
                    "only the posting scout can cancel job {job_id}"
                )));
            }
            job.apply_event(JobEvent::JobCancelled)?;
            job.escrow_amount = 0;
            job.clone()
        };

        info!(job = job_id, "job cancelled");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobCancelled,
            caller,
            Some(job_id),
            serde_json::json!({}),
        )
        .await?;

        Ok(job)
    }

    /// Raise a dispute. Either party; freezes the lifecycle until the
    /// owner resolves it.
    pub async fn dispute_job(
        &self,
        caller: Uuid,
        job_id: JobId,
        reason: impl Into<String>,
    ) -> Result<Job> {
        self.ensure_active()?;
        let reason = reason.into();
        let job = {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            if !job.is_party(caller) {
                return Err(SecureScoutError::NotAuthorized(format!(
                    "only a party to job {job_id} can dispute it"
                )));
            }
            if job.is_paid {
                return Err(SecureScoutError::PaymentAlreadyReleased(job_id));
            }
            job.apply_event(JobEvent::DisputeRaised)?;
            job.dispute_reason = Some(reason.clone());
            job.clone()
        };

        info!(job = job_id, by = %caller, "dispute raised");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::JobDisputed,
            caller,
            Some(job_id),
            serde_json::json!({"reason": reason}),
        )
        .await?;

        Ok(job)
    }

    /// Settle a frozen dispute in favor of one party. Owner only. The
    /// matching release or refund is orchestrated by the hub.
    pub async fn resolve_dispute(
        &self,
        caller: Uuid,
        job_id: JobId,
        in_favor_of_agent: bool,
    ) -> Result<Job> {
        self.ensure_active()?;
        self.ensure_owner(caller)?;
        let job = {
            let mut job = self
                .jobs
                .get_mut(&job_id)
                .ok_or(SecureScoutError::JobNotFound(job_id))?;
            let event = if in_favor_of_agent {
                // A dispute raised before assignment has no agent to pay.
                if job.assigned_agent.is_none() {
                    return Err(SecureScoutError::InvalidStateTransition {
                        from: job.status,
                        event: JobEvent::ResolvedForAgent,
                    });
                }
                JobEvent::ResolvedForAgent
            } else {
                JobEvent::ResolvedForScout
            };
            job.apply_event(event)?;
            if in_favor_of_agent {
                job.is_paid = true;
            }
            job.escrow_amount = 0;
            job.clone()
        };

        info!(job = job_id, in_favor_of_agent, "dispute resolved");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::DisputeResolved,
            caller,
            Some(job_id),
            serde_json::json!({"in_favor_of_agent": in_favor_of_agent}),
        )
        .await?;

        Ok(job)
    }

    /// Block all mutating entry points. Owner only.
    pub async fn pause(&self, caller: Uuid) -> Result<()> {
        self.ensure_owner(caller)?;
        self.paused.store(true, Ordering::SeqCst);
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::RegistryPaused,
            caller,
            None,
            serde_json::json!({"registry": "jobs"}),
        )
        .await
    }

    /// Lift a pause. Owner only.
    pub async fn unpause(&self, caller: Uuid) -> Result<()> {
        self.ensure_owner(caller)?;
        self.paused.store(false, Ordering::SeqCst);
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::RegistryUnpaused,
            caller,
            None,
            serde_json::json!({"registry": "jobs"}),
        )
        .await
    }

    // ---- Views (never blocked by pause) ----

    pub fn get_job(&self, job_id: JobId) -> Result<Job> {
        self.jobs
            .get(&job_id)
            .map(|j| j.clone())
            .ok_or(SecureScoutError::JobNotFound(job_id))
    }

    pub fn job_count(&self) -> u64 {
        self.next_job_id.load(Ordering::SeqCst)
    }

    pub fn applications(&self, job_id: JobId) -> Result<Vec<Uuid>> {
        Ok(self.get_job(job_id)?.applicants)
    }

    /// Jobs posted by a scout, paginated in posting order.
    pub fn jobs_for_scout(&self, scout: Uuid, start: usize, count: usize) -> Vec<Job> {
        self.paginated_ids(self.scout_jobs.get(&scout), start, count)
    }

    /// Jobs assigned to an agent, paginated in assignment order.
    pub fn jobs_for_agent(&self, agent: Uuid, start: usize, count: usize) -> Vec<Job> {
        self.paginated_ids(self.agent_jobs.get(&agent), start, count)
    }

    /// Open jobs in posting order, paginated with explicit bounds.
    /// Linear scan; job ids are dense so the order is deterministic.
    pub fn open_jobs(&self, start: usize, count: usize) -> Vec<Job> {
        (1..=self.job_count())
            .filter_map(|id| self.jobs.get(&id).map(|j| j.clone()))
            .filter(|j| j.status == JobStatus::Open)
            .skip(start)
            .take(count)
            .collect()
    }

    fn paginated_ids(
        &self,
        ids: Option<dashmap::mapref::one::Ref<'_, Uuid, Vec<JobId>>>,
        start: usize,
        count: usize,
    ) -> Vec<Job> {
        let Some(ids) = ids else {
            return Vec::new();
        };
        ids.iter()
            .skip(start)
            .take(count)
            .filter_map(|id| self.jobs.get(id).map(|j| j.clone()))
            .collect()
    }
}
