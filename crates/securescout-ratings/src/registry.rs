use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use securescout_jobs::JobRegistry;
use securescout_ledger::{Ledger, LedgerEntryKind, append_chained};
use securescout_types::{
    JobId, MAX_RATING, MIN_RATING, Result, Review, ReviewDirection, SecureScoutError,
};
use securescout_users::UserRegistry;

/// Post-completion review ledger. One review per (job, direction); the
/// aggregate averages live in the UserRegistry and are moved through this
/// registry's component id, which the hub registers as a rating authority.
pub struct RatingRegistry {
    owner: Uuid,
    paused: AtomicBool,
    component_id: Uuid,
    reviews: DashMap<(JobId, ReviewDirection), Review>,
    by_reviewee: DashMap<Uuid, Vec<(JobId, ReviewDirection)>>,
    by_reviewer: DashMap<Uuid, Vec<(JobId, ReviewDirection)>>,
    users: Arc<UserRegistry>,
    jobs: Arc<JobRegistry>,
    ledger: Arc<dyn Ledger>,
}

impl RatingRegistry {
    pub fn new(
        owner: Uuid,
        users: Arc<UserRegistry>,
        jobs: Arc<JobRegistry>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            owner,
            paused: AtomicBool::new(false),
            component_id: Uuid::new_v4(),
            reviews: DashMap::new(),
            by_reviewee: DashMap::new(),
            by_reviewer: DashMap::new(),
            users,
            jobs,
            ledger,
        }
    }

    /// The identity under which this registry calls back into the
    /// UserRegistry. The hub grants it rating authority at wiring time.
    pub fn component_id(&self) -> Uuid {
        self.component_id
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

    fn ensure_rating_in_range(rating: u8) -> Result<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(SecureScoutError::RatingOutOfRange(rating));
        }
        Ok(())
    }

    /// Rate the agent who completed a job. Posting scout only.
    pub async fn rate_agent(
        &self,
        caller: Uuid,
        job_id: JobId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Review> {
        self.ensure_active()?;
        Self::ensure_rating_in_range(rating)?;

        let job = self.jobs.get_job(job_id)?;
        if !job.is_completed {
            return Err(SecureScoutError::JobNotCompleted(job_id));
        }
        if !job.is_scout(caller) {
            return Err(SecureScoutError::NotAuthorized(format!(
                "only the posting scout can rate the agent for job {job_id}"
            )));
        }
        let reviewee = job
            .assigned_agent
            .ok_or_else(|| SecureScoutError::Internal("completed job has no agent".into()))?;

        self.insert_review(
            caller,
            reviewee,
            job_id,
            ReviewDirection::ScoutToAgent,
            rating,
            comment.into(),
        )
        .await
    }

    /// Rate the scout who posted a job. Assigned agent only.
    pub async fn rate_scout(
        &self,
        caller: Uuid,
        job_id: JobId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Review> {
        self.ensure_active()?;
        Self::ensure_rating_in_range(rating)?;

        let job = self.jobs.get_job(job_id)?;
        if !job.is_completed {
            return Err(SecureScoutError::JobNotCompleted(job_id));
        }
        if !job.is_assigned_agent(caller) {
            return Err(SecureScoutError::NotAuthorized(format!(
                "only the assigned agent can rate the scout for job {job_id}"
            )));
        }

        self.insert_review(
            caller,
            job.scout,
            job_id,
            ReviewDirection::AgentToScout,
            rating,
            comment.into(),
        )
        .await
    }

    async fn insert_review(
        &self,
        reviewer: Uuid,
        reviewee: Uuid,
        job_id: JobId,
        direction: ReviewDirection,
        rating: u8,
        comment: String,
    ) -> Result<Review> {
        let key = (job_id, direction);
        if self.reviews.contains_key(&key) {
            return Err(SecureScoutError::DuplicateReview(job_id));
        }

        let new_average = match direction {
            ReviewDirection::ScoutToAgent => {
                self.users
                    .apply_agent_rating(self.component_id, reviewee, rating)?
            }
            ReviewDirection::AgentToScout => {
                self.users
                    .apply_scout_rating(self.component_id, reviewee, rating)?
            }
        };

        let review = Review::new(reviewer, reviewee, job_id, direction, rating, comment);
        self.reviews.insert(key, review.clone());
        self.by_reviewee.entry(reviewee).or_default().push(key);
        self.by_reviewer.entry(reviewer).or_default().push(key);

        let kind = match direction {
            ReviewDirection::ScoutToAgent => LedgerEntryKind::AgentRated,
            ReviewDirection::AgentToScout => LedgerEntryKind::ScoutRated,
        };
        info!(job = job_id, reviewee = %reviewee, rating, new_average, "review recorded");
        append_chained(
            self.ledger.as_ref(),
            kind,
            reviewer,
            Some(job_id),
            serde_json::json!({
                "reviewee": reviewee,
                "rating": rating,
                "new_average": new_average,
            }),
        )
        .await?;

        Ok(review)
    }

    /// Amend a previously submitted review. Original rater only; the
    /// target's average is re-derived by replacing the prior rating.
    pub async fn update_review(
        &self,
        caller: Uuid,
        job_id: JobId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Review> {
        self.ensure_active()?;
        Self::ensure_rating_in_range(rating)?;

        let job = self.jobs.get_job(job_id)?;
        let direction = if job.is_scout(caller) {
            ReviewDirection::ScoutToAgent
        } else if job.is_assigned_agent(caller) {
            ReviewDirection::AgentToScout
        } else {
            return Err(SecureScoutError::NotAuthorized(format!(
                "{caller} has no review to amend for job {job_id}"
            )));
        };

        let comment = comment.into();
        let review = {
            let mut review = self
                .reviews
                .get_mut(&(job_id, direction))
                .ok_or(SecureScoutError::ReviewNotFound(job_id))?;
            let old_rating = review.rating;
            match direction {
                ReviewDirection::ScoutToAgent => self.users.amend_agent_rating(
                    self.component_id,
                    review.reviewee,
                    old_rating,
                    rating,
                )?,
                ReviewDirection::AgentToScout => self.users.amend_scout_rating(
                    self.component_id,
                    review.reviewee,
                    old_rating,
                    rating,
                )?,
            };
            review.rating = rating;
            review.comment = comment;
            review.updated_at = Some(Utc::now());
            review.clone()
        };

        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::ReviewUpdated,
            caller,
            Some(job_id),
            serde_json::json!({"rating": rating}),
        )
        .await?;

        Ok(review)
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
            serde_json::json!({"registry": "ratings"}),
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
            serde_json::json!({"registry": "ratings"}),
        )
        .await
    }

    // ---- Views (never blocked by pause) ----

    pub fn get_review(&self, job_id: JobId, direction: ReviewDirection) -> Result<Review> {
        self.reviews
            .get(&(job_id, direction))
            .map(|r| r.clone())
            .ok_or(SecureScoutError::ReviewNotFound(job_id))
    }

    /// Both reviews attached to a job, in whichever order they exist.
    pub fn job_reviews(&self, job_id: JobId) -> Vec<Review> {
        [ReviewDirection::ScoutToAgent, ReviewDirection::AgentToScout]
            .into_iter()
            .filter_map(|d| self.reviews.get(&(job_id, d)).map(|r| r.clone()))
            .collect()
    }

    /// Reviews received by an account.
    pub fn reviews_about(&self, account: Uuid) -> Vec<Review> {
        self.collect_keys(self.by_reviewee.get(&account))
    }

    /// Reviews written by an account.
    pub fn reviews_by(&self, account: Uuid) -> Vec<Review> {
        self.collect_keys(self.by_reviewer.get(&account))
    }

    fn collect_keys(
        &self,
        keys: Option<dashmap::mapref::one::Ref<'_, Uuid, Vec<(JobId, ReviewDirection)>>>,
    ) -> Vec<Review> {
        let Some(keys) = keys else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|k| self.reviews.get(k).map(|r| r.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securescout_jobs::PostJobRequest;
    use securescout_ledger::InMemoryLedger;
    use securescout_types::ONE_PAS;

    struct Fixture {
        owner: Uuid,
        users: Arc<UserRegistry>,
        jobs: Arc<JobRegistry>,
        ratings: RatingRegistry,
    }

    fn fixture() -> Fixture {
        let owner = Uuid::new_v4();
        let ledger: Arc<InMemoryLedger> = Arc::new(InMemoryLedger::new());
        let users = Arc::new(UserRegistry::new(owner, ledger.clone()));
        let jobs = Arc::new(JobRegistry::new(owner, users.clone(), ledger.clone()));
        let ratings = RatingRegistry::new(owner, users.clone(), jobs.clone(), ledger);
        users
            .grant_rating_authority(owner, ratings.component_id())
            .unwrap();
        Fixture {
            owner,
            users,
            jobs,
            ratings,
        }
    }

    async fn completed_job(f: &Fixture) -> (Uuid, Uuid, JobId) {
        let scout = Uuid::new_v4();
        f.users
            .register_scout(scout, "ada", "ada@example.com", "Lisbon")
            .await
            .unwrap();
        let agent = Uuid::new_v4();
        f.users
            .register_agent(agent, "bob", "bob@example.com", "photo", ONE_PAS, "Porto")
            .await
            .unwrap();
        let job = f
            .jobs
            .post_job(
                scout,
                PostJobRequest {
                    title: "t".into(),
                    description: "d".into(),
                    location: "l".into(),
                    budget: ONE_PAS,
                    preferred_agent: None,
                    deadline: None,
                },
            )
            .await
            .unwrap();
        f.jobs.apply_for_job(agent, job.id).await.unwrap();
        f.jobs.accept_agent(scout, job.id, agent).await.unwrap();
        f.jobs.start_job(agent, job.id).await.unwrap();
        f.jobs
            .submit_completion(agent, job.id, "done", vec![])
            .await
            .unwrap();
        (scout, agent, job.id)
    }

    #[tokio::test]
    async fn test_rate_both_directions() {
        let f = fixture();
        let (scout, agent, job_id) = completed_job(&f).await;

        let review = f
            .ratings
            .rate_agent(scout, job_id, 5, "sharp photos")
            .await
            .unwrap();
        assert_eq!(review.reviewee, agent);
        assert_eq!(review.direction, ReviewDirection::ScoutToAgent);

        f.ratings
            .rate_scout(agent, job_id, 4, "clear brief")
            .await
            .unwrap();

        assert_eq!(f.users.get_agent(agent).unwrap().average_rating, 500);
        assert_eq!(f.users.get_scout(scout).unwrap().average_rating, 400);
        assert_eq!(f.ratings.job_reviews(job_id).len(), 2);
        assert_eq!(f.ratings.reviews_about(agent).len(), 1);
        assert_eq!(f.ratings.reviews_by(agent).len(), 1);
    }

    #[tokio::test]
    async fn test_one_review_per_direction() {
        let f = fixture();
        let (scout, _agent, job_id) = completed_job(&f).await;
        f.ratings.rate_agent(scout, job_id, 5, "").await.unwrap();
        assert!(matches!(
            f.ratings.rate_agent(scout, job_id, 4, "").await,
            Err(SecureScoutError::DuplicateReview(_))
        ));
    }

    #[tokio::test]
    async fn test_rating_bounds() {
        let f = fixture();
        let (scout, _, job_id) = completed_job(&f).await;
        for rating in [0u8, 6] {
            assert!(matches!(
                f.ratings.rate_agent(scout, job_id, rating, "").await,
                Err(SecureScoutError::RatingOutOfRange(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_rating_requires_completion_and_role() {
        let f = fixture();
        let scout = Uuid::new_v4();
        f.users
            .register_scout(scout, "ada", "a@example.com", "Lisbon")
            .await
            .unwrap();
        let job = f
            .jobs
            .post_job(
                scout,
                PostJobRequest {
                    title: "t".into(),
                    description: "d".into(),
                    location: "l".into(),
                    budget: ONE_PAS,
                    preferred_agent: None,
                    deadline: None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            f.ratings.rate_agent(scout, job.id, 5, "").await,
            Err(SecureScoutError::JobNotCompleted(_))
        ));

        let (scout2, agent2, done) = completed_job(&f).await;
        // Wrong party in each direction.
        assert!(matches!(
            f.ratings.rate_agent(agent2, done, 5, "").await,
            Err(SecureScoutError::NotAuthorized(_))
        ));
        assert!(matches!(
            f.ratings.rate_scout(scout2, done, 5, "").await,
            Err(SecureScoutError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_update_review_amends_average() {
        let f = fixture();
        let (scout, agent, job_id) = completed_job(&f).await;
        let (other_scout, other_agent, second) = completed_job(&f).await;
        f.ratings.rate_agent(scout, job_id, 2, "late").await.unwrap();
        f.ratings.rate_agent(other_scout, second, 4, "").await.unwrap();

        // First agent has a single 2-star rating.
        assert_eq!(f.users.get_agent(agent).unwrap().average_rating, 200);

        let review = f
            .ratings
            .update_review(scout, job_id, 5, "delivered after all")
            .await
            .unwrap();
        assert_eq!(review.rating, 5);
        assert!(review.updated_at.is_some());
        assert_eq!(f.users.get_agent(agent).unwrap().average_rating, 500);
        assert_eq!(f.users.get_agent(agent).unwrap().total_ratings, 1);
        // The other agent's aggregate is untouched.
        assert_eq!(f.users.get_agent(other_agent).unwrap().average_rating, 400);
    }

    #[tokio::test]
    async fn test_update_review_requires_original_rater() {
        let f = fixture();
        let (scout, agent, job_id) = completed_job(&f).await;
        f.ratings.rate_agent(scout, job_id, 3, "").await.unwrap();

        // The agent has no ScoutToAgent review to amend.
        assert!(matches!(
            f.ratings.update_review(agent, job_id, 5, "").await,
            Err(SecureScoutError::ReviewNotFound(_))
        ));
        assert!(matches!(
            f.ratings.update_review(Uuid::new_v4(), job_id, 5, "").await,
            Err(SecureScoutError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_component_cannot_move_aggregates() {
        let f = fixture();
        let (scout, agent, job_id) = completed_job(&f).await;

        // A rating registry whose component id was never granted authority.
        let rogue = RatingRegistry::new(
            f.owner,
            f.users.clone(),
            f.jobs.clone(),
            Arc::new(InMemoryLedger::new()),
        );
        assert!(matches!(
            rogue.rate_agent(scout, job_id, 5, "").await,
            Err(SecureScoutError::NotAuthorized(_))
        ));
        assert_eq!(f.users.get_agent(agent).unwrap().total_ratings, 0);
    }

    #[tokio::test]
    async fn test_pause_blocks_mutations_not_views() {
        let f = fixture();
        let (scout, _, job_id) = completed_job(&f).await;
        f.ratings.rate_agent(scout, job_id, 5, "").await.unwrap();
        f.ratings.pause(f.owner).await.unwrap();

        assert!(matches!(
            f.ratings.update_review(scout, job_id, 4, "").await,
            Err(SecureScoutError::RegistryPaused)
        ));
        assert_eq!(f.ratings.job_reviews(job_id).len(), 1);

        f.ratings.unpause(f.owner).await.unwrap();
        assert!(f.ratings.update_review(scout, job_id, 4, "").await.is_ok());
    }
}
