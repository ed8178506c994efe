use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pas::Pas;

/// The two mutually exclusive marketplace roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Scout,
    Agent,
}

/// A scout: posts jobs and pays for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scout {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub location: String,
    pub total_jobs_posted: u64,
    pub total_spent: Pas,
    /// Fixed-point average, scaled by 100 (one star = 100).
    pub average_rating: u64,
    pub total_ratings: u64,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
}

impl Scout {
    pub fn new(
        id: Uuid,
        display_name: impl Into<String>,
        email: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: email.into(),
            location: location.into(),
            total_jobs_posted: 0,
            total_spent: 0,
            average_rating: 0,
            total_ratings: 0,
            is_active: true,
            registered_at: Utc::now(),
        }
    }
}

/// An agent: performs jobs and gets paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub service_type: String,
    /// Advertised price in plancks.
    pub price: Pas,
    pub location: String,
    pub completed_jobs: u64,
    pub total_earnings: Pas,
    /// Fixed-point average, scaled by 100 (one star = 100).
    pub average_rating: u64,
    pub total_ratings: u64,
    pub is_available: bool,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        email: impl Into<String>,
        service_type: impl Into<String>,
        price: Pas,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            service_type: service_type.into(),
            price,
            location: location.into(),
            completed_jobs: 0,
            total_earnings: 0,
            average_rating: 0,
            total_ratings: 0,
            is_available: true,
            is_active: true,
            registered_at: Utc::now(),
        }
    }

    pub fn matches_location(&self, location: &str) -> bool {
        self.location.eq_ignore_ascii_case(location)
    }

    pub fn matches_service(&self, service_type: &str) -> bool {
        self.service_type.eq_ignore_ascii_case(service_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pas::ONE_PAS;

    #[test]
    fn test_new_scout_defaults() {
        let scout = Scout::new(Uuid::new_v4(), "ada", "ada@example.com", "Lisbon");
        assert!(scout.is_active);
        assert_eq!(scout.total_jobs_posted, 0);
        assert_eq!(scout.total_ratings, 0);
    }

    #[test]
    fn test_new_agent_defaults() {
        let agent = Agent::new(
            Uuid::new_v4(),
            "bob",
            "bob@example.com",
            "photography",
            2 * ONE_PAS,
            "Porto",
        );
        assert!(agent.is_available);
        assert!(agent.is_active);
        assert_eq!(agent.price, 2 * ONE_PAS);
        assert_eq!(agent.completed_jobs, 0);
    }

    #[test]
    fn test_filter_matching_ignores_case() {
        let agent = Agent::new(Uuid::new_v4(), "bob", "b@e.com", "Photography", 1, "Porto");
        assert!(agent.matches_location("porto"));
        assert!(agent.matches_service("photography"));
        assert!(!agent.matches_location("Lisbon"));
        assert!(!agent.matches_service("plumbing"));
    }
}
