use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::JobId;

/// Averages are stored as fixed point scaled by this factor
/// (a 4.5-star average is 450).
pub const RATING_SCALE: u64 = 100;

/// Lowest and highest permitted rating.
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Which party is reviewing which. One review per (job, direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewDirection {
    ScoutToAgent,
    AgentToScout,
}

/// A review left against one party of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub reviewer: Uuid,
    pub reviewee: Uuid,
    pub job_id: JobId,
    pub direction: ReviewDirection,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn new(
        reviewer: Uuid,
        reviewee: Uuid,
        job_id: JobId,
        direction: ReviewDirection,
        rating: u8,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            reviewer,
            reviewee,
            job_id,
            direction,
            rating,
            comment: comment.into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Fold one new rating into a scaled average:
/// `new = (old * count + rating * SCALE) / (count + 1)`, truncating.
pub fn rolling_average(old_average: u64, old_count: u64, rating: u8) -> u64 {
    (old_average * old_count + rating as u64 * RATING_SCALE) / (old_count + 1)
}

/// Replace one prior rating inside a scaled average, keeping the count.
pub fn amended_average(average: u64, count: u64, old_rating: u8, new_rating: u8) -> u64 {
    debug_assert!(count > 0);
    let sum = (average * count + new_rating as u64 * RATING_SCALE)
        .saturating_sub(old_rating as u64 * RATING_SCALE);
    sum / count
}
