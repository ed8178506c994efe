use std::sync::{Arc, RwLock};

use tracing::info;
use uuid::Uuid;

use securescout_jobs::{JobRegistry, PostJobRequest};
use securescout_ledger::Ledger;
use securescout_payments::{PaymentRegistry, ReleasedPayment};
use securescout_ratings::RatingRegistry;
use securescout_types::{
    Agent, Job, JobId, Pas, Result, Review, Scout, SecureScoutError,
};
use securescout_users::UserRegistry;

/// Façade over the four registries. Re-exposes their operations under one
/// handle, orchestrates the flows that span registries, and cascades
/// emergency pause. Registry references sit behind owner-only swappable
/// slots for upgrade flexibility.
pub struct SecureScoutHub {
    owner: Uuid,
    users: RwLock<Arc<UserRegistry>>,
    jobs: RwLock<Arc<JobRegistry>>,
    payments: RwLock<Arc<PaymentRegistry>>,
    ratings: RwLock<Arc<RatingRegistry>>,
}

impl SecureScoutHub {
    /// Wire a hub over existing registries. Grants the rating registry
    /// its authority over the user registry's aggregates.
    pub fn new(
        owner: Uuid,
        users: Arc<UserRegistry>,
        jobs: Arc<JobRegistry>,
        payments: Arc<PaymentRegistry>,
        ratings: Arc<RatingRegistry>,
    ) -> Result<Self> {
        users.grant_rating_authority(owner, ratings.component_id())?;
        Ok(Self {
            owner,
            users: RwLock::new(users),
            jobs: RwLock::new(jobs),
            payments: RwLock::new(payments),
            ratings: RwLock::new(ratings),
        })
    }

    /// Build the whole registry stack over one shared ledger.
    pub fn bootstrap(owner: Uuid, platform_fee_bps: u16, ledger: Arc<dyn Ledger>) -> Result<Self> {
        let users = Arc::new(UserRegistry::new(owner, ledger.clone()));
        let jobs = Arc::new(JobRegistry::new(owner, users.clone(), ledger.clone()));
        let payments = Arc::new(PaymentRegistry::new(
            owner,
            platform_fee_bps,
            users.clone(),
            jobs.clone(),
            ledger.clone(),
        ));
        let ratings = Arc::new(RatingRegistry::new(
            owner,
            users.clone(),
            jobs.clone(),
            ledger,
        ));
        Self::new(owner, users, jobs, payments, ratings)
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    fn ensure_owner(&self, caller: Uuid) -> Result<()> {
        if caller != self.owner {
            return Err(SecureScoutError::NotAuthorized(format!(
                "{caller} is not the hub owner"
            )));
        }
        Ok(())
    }

    pub fn users(&self) -> Arc<UserRegistry> {
        self.users.read().expect("registry slot poisoned").clone()
    }

    pub fn jobs(&self) -> Arc<JobRegistry> {
        self.jobs.read().expect("registry slot poisoned").clone()
    }

    pub fn payments(&self) -> Arc<PaymentRegistry> {
        self.payments.read().expect("registry slot poisoned").clone()
    }

    pub fn ratings(&self) -> Arc<RatingRegistry> {
        self.ratings.read().expect("registry slot poisoned").clone()
    }

    // ---- Registry slots (owner only) ----

    pub fn set_user_registry(&self, caller: Uuid, users: Arc<UserRegistry>) -> Result<()> {
        self.ensure_owner(caller)?;
        users.grant_rating_authority(caller, self.ratings().component_id())?;
        *self.users.write().expect("registry slot poisoned") = users;
        Ok(())
    }

    pub fn set_job_registry(&self, caller: Uuid, jobs: Arc<JobRegistry>) -> Result<()> {
        self.ensure_owner(caller)?;
        *self.jobs.write().expect("registry slot poisoned") = jobs;
        Ok(())
    }

    pub fn set_payment_registry(&self, caller: Uuid, payments: Arc<PaymentRegistry>) -> Result<()> {
        self.ensure_owner(caller)?;
        *self.payments.write().expect("registry slot poisoned") = payments;
        Ok(())
    }

    pub fn set_rating_registry(&self, caller: Uuid, ratings: Arc<RatingRegistry>) -> Result<()> {
        self.ensure_owner(caller)?;
        self.users()
            .grant_rating_authority(caller, ratings.component_id())?;
        *self.ratings.write().expect("registry slot poisoned") = ratings;
        Ok(())
    }

    // ---- Registration and profiles ----

    pub async fn register_scout(
        &self,
        caller: Uuid,
        display_name: impl Into<String>,
        email: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Scout> {
        self.users()
            .register_scout(caller, display_name, email, location)
            .await
    }

    pub async fn register_agent(
        &self,
        caller: Uuid,
        name: impl Into<String>,
        email: impl Into<String>,
        service_type: impl Into<String>,
        price: Pas,
        location: impl Into<String>,
    ) -> Result<Agent> {
        self.users()
            .register_agent(caller, name, email, service_type, price, location)
            .await
    }

    pub async fn set_agent_availability(&self, caller: Uuid, available: bool) -> Result<()> {
        self.users().set_agent_availability(caller, available).await
    }

    pub async fn update_agent_price(&self, caller: Uuid, price: Pas) -> Result<()> {
        self.users().update_agent_price(caller, price).await
    }

    pub async fn update_agent_location(
        &self,
        caller: Uuid,
        location: impl Into<String>,
    ) -> Result<()> {
        self.users().update_agent_location(caller, location).await
    }

    // ---- Job lifecycle ----

    /// Post a job and fund its escrow in one flow. The deposit must match
    /// the budget before anything is created.
    pub async fn post_job_request(
        &self,
        caller: Uuid,
        request: PostJobRequest,
        deposit: Pas,
    ) -> Result<Job> {
        if deposit != request.budget {
            return Err(SecureScoutError::InsufficientDeposit {
                expected: request.budget,
                actual: deposit,
            });
        }
        let payments = self.payments();
        // A paused payment registry would strand the job unfunded.
        if payments.is_paused() {
            return Err(SecureScoutError::RegistryPaused);
        }
        let job = self.jobs().post_job(caller, request).await?;
        payments.deposit_funds(caller, job.id, deposit).await?;
        Ok(job)
    }

    pub async fn apply_for_job(&self, caller: Uuid, job_id: JobId) -> Result<()> {
        self.jobs().apply_for_job(caller, job_id).await
    }

    pub async fn accept_agent(&self, caller: Uuid, job_id: JobId, agent: Uuid) -> Result<Job> {
        self.jobs().accept_agent(caller, job_id, agent).await
    }

    pub async fn start_job(&self, caller: Uuid, job_id: JobId) -> Result<Job> {
        self.jobs().start_job(caller, job_id).await
    }

    pub async fn update_job_progress(
        &self,
        caller: Uuid,
        job_id: JobId,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<()> {
        self.jobs()
            .update_progress(caller, job_id, progress, message)
            .await
    }

    pub async fn submit_job_completion(
        &self,
        caller: Uuid,
        job_id: JobId,
        deliverables: impl Into<String>,
        proof_urls: Vec<String>,
    ) -> Result<Job> {
        self.jobs()
            .submit_completion(caller, job_id, deliverables, proof_urls)
            .await
    }

    /// Approve a submitted completion: release the escrow to the agent,
    /// then mark the job paid.
    pub async fn approve_job_completion(
        &self,
        caller: Uuid,
        job_id: JobId,
    ) -> Result<ReleasedPayment> {
        let jobs = self.jobs();
        let job = jobs.get_job(job_id)?;
        if !job.is_scout(caller) {
            return Err(SecureScoutError::NotAuthorized(format!(
                "only the posting scout can approve job {job_id}"
            )));
        }
        // A paused job registry would strand the release unmarked.
        if jobs.is_paused() {
            return Err(SecureScoutError::RegistryPaused);
        }
        let released = self.payments().release_payment(caller, job_id).await?;
        jobs.approve_completion(caller, job_id).await?;
        info!(job = job_id, payout = %released.payout, "job approved and paid");
        Ok(released)
    }

    /// Cancel an unfinished job and refund its escrow to the scout.
    pub async fn cancel_job_request(&self, caller: Uuid, job_id: JobId) -> Result<Pas> {
        let payments = self.payments();
        if payments.is_paused() {
            return Err(SecureScoutError::RegistryPaused);
        }
        self.jobs().cancel_job(caller, job_id).await?;
        payments.refund_payment(caller, job_id).await
    }

    pub async fn dispute_job(
        &self,
        caller: Uuid,
        job_id: JobId,
        reason: impl Into<String>,
    ) -> Result<Job> {
        self.jobs().dispute_job(caller, job_id, reason).await
    }

    /// Settle a dispute: release to the agent, or refund the scout.
    /// Owner only. Returns the released payment when the agent prevails.
    pub async fn resolve_dispute(
        &self,
        caller: Uuid,
        job_id: JobId,
        in_favor_of_agent: bool,
    ) -> Result<Option<ReleasedPayment>> {
        let payments = self.payments();
        if payments.is_paused() {
            return Err(SecureScoutError::RegistryPaused);
        }
        self.jobs()
            .resolve_dispute(caller, job_id, in_favor_of_agent)
            .await?;
        if in_favor_of_agent {
            Ok(Some(payments.release_payment(caller, job_id).await?))
        } else {
            payments.refund_payment(caller, job_id).await?;
            Ok(None)
        }
    }

    // ---- Payments ----

    pub async fn withdraw_earnings(&self, caller: Uuid) -> Result<Pas> {
        self.payments().withdraw_earnings(caller).await
    }

    pub async fn withdraw_platform_fees(&self, caller: Uuid) -> Result<Pas> {
        self.payments().withdraw_platform_fees(caller).await
    }

    pub async fn emergency_withdraw(&self, caller: Uuid, job_id: JobId) -> Result<Pas> {
        self.payments().emergency_withdraw(caller, job_id).await
    }

    // ---- Ratings ----

    pub async fn rate_agent(
        &self,
        caller: Uuid,
        job_id: JobId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Review> {
        self.ratings().rate_agent(caller, job_id, rating, comment).await
    }

    pub async fn rate_scout(
        &self,
        caller: Uuid,
        job_id: JobId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Review> {
        self.ratings().rate_scout(caller, job_id, rating, comment).await
    }

    pub async fn update_review(
        &self,
        caller: Uuid,
        job_id: JobId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Review> {
        self.ratings()
            .update_review(caller, job_id, rating, comment)
            .await
    }

    // ---- Emergency pause cascade ----

    /// Pause every registry. Owner only.
    pub async fn emergency_pause(&self, caller: Uuid) -> Result<()> {
        self.ensure_owner(caller)?;
        self.users().pause(caller).await?;
        self.jobs().pause(caller).await?;
        self.payments().pause(caller).await?;
        self.ratings().pause(caller).await?;
        info!("emergency pause engaged");
        Ok(())
    }

    /// Unpause every registry. Owner only.
    pub async fn emergency_unpause(&self, caller: Uuid) -> Result<()> {
        self.ensure_owner(caller)?;
        self.users().unpause(caller).await?;
        self.jobs().unpause(caller).await?;
        self.payments().unpause(caller).await?;
        self.ratings().unpause(caller).await?;
        info!("emergency pause lifted");
        Ok(())
    }

    // ---- Views ----

    pub fn get_scout(&self, account: Uuid) -> Result<Scout> {
        self.users().get_scout(account)
    }

    pub fn get_agent(&self, account: Uuid) -> Result<Agent> {
        self.users().get_agent(account)
    }

    pub fn get_job_request(&self, job_id: JobId) -> Result<Job> {
        self.jobs().get_job(job_id)
    }

    pub fn get_job_applications(&self, job_id: JobId) -> Result<Vec<Uuid>> {
        self.jobs().applications(job_id)
    }

    pub fn get_scout_jobs(&self, scout: Uuid, start: usize, count: usize) -> Vec<Job> {
        self.jobs().jobs_for_scout(scout, start, count)
    }

    pub fn get_agent_jobs(&self, agent: Uuid, start: usize, count: usize) -> Vec<Job> {
        self.jobs().jobs_for_agent(agent, start, count)
    }

    pub fn open_jobs(&self, start: usize, count: usize) -> Vec<Job> {
        self.jobs().open_jobs(start, count)
    }

    pub fn get_escrow_balance(&self, job_id: JobId) -> Pas {
        self.payments().escrow_balance(job_id)
    }

    pub fn get_pending_payments(&self, agent: Uuid) -> Pas {
        self.payments().pending_earnings(agent)
    }

    /// Scaled average and rating count for an agent.
    pub fn get_agent_rating(&self, agent: Uuid) -> Result<(u64, u64)> {
        let agent = self.users().get_agent(agent)?;
        Ok((agent.average_rating, agent.total_ratings))
    }

    /// Scaled average and rating count for a scout.
    pub fn get_scout_rating(&self, scout: Uuid) -> Result<(u64, u64)> {
        let scout = self.users().get_scout(scout)?;
        Ok((scout.average_rating, scout.total_ratings))
    }

    pub fn get_job_reviews(&self, job_id: JobId) -> Vec<Review> {
        self.ratings().job_reviews(job_id)
    }

    pub fn get_user_reviews(&self, account: Uuid) -> Vec<Review> {
        self.ratings().reviews_about(account)
    }
}
