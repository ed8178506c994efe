use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use securescout_ledger::{Ledger, LedgerEntryKind, append_chained};
use securescout_types::{
    Agent, Pas, Result, Role, Scout, SecureScoutError, review::amended_average,
    review::rolling_average,
};

/// Registry of scout and agent profiles. An account holds at most one of
/// the two roles, assigned once at registration.
pub struct UserRegistry {
    owner: Uuid,
    paused: AtomicBool,
    scouts: DashMap<Uuid, Scout>,
    agents: DashMap<Uuid, Agent>,
    /// Insertion-ordered agent ids, for stable pagination.
    agent_index: RwLock<Vec<Uuid>>,
    /// Component ids allowed to move the aggregate rating fields.
    rating_authorities: DashMap<Uuid, ()>,
    ledger: Arc<dyn Ledger>,
}

impl UserRegistry {
    pub fn new(owner: Uuid, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            owner,
            paused: AtomicBool::new(false),
            scouts: DashMap::new(),
            agents: DashMap::new(),
            agent_index: RwLock::new(Vec::new()),
            rating_authorities: DashMap::new(),
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

    fn ensure_unregistered(&self, account: Uuid) -> Result<()> {
        if self.scouts.contains_key(&account) || self.agents.contains_key(&account) {
            return Err(SecureScoutError::AlreadyRegistered(account));
        }
        Ok(())
    }

    fn ensure_rating_authority(&self, caller: Uuid) -> Result<()> {
        if caller != self.owner && !self.rating_authorities.contains_key(&caller) {
            return Err(SecureScoutError::NotAuthorized(format!(
                "{caller} is not a rating authority"
            )));
        }
        Ok(())
    }

    /// Register the calling account as a scout. Fails if the account
    /// already holds either role.
    pub async fn register_scout(
        &self,
        caller: Uuid,
        display_name: impl Into<String>,
        email: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Scout> {
        self.ensure_active()?;
        self.ensure_unregistered(caller)?;

        let scout = Scout::new(caller, display_name, email, location);
        self.scouts.insert(caller, scout.clone());

        info!(scout = %caller, name = %scout.display_name, "scout registered");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::ScoutRegistered,
            caller,
            None,
            serde_json::json!({"display_name": scout.display_name, "location": scout.location}),
        )
        .await?;

        Ok(scout)
    }

    /// Register the calling account as an agent. Fails if the account
    /// already holds either role.
    pub async fn register_agent(
        &self,
        caller: Uuid,
        name: impl Into<String>,
        email: impl Into<String>,
        service_type: impl Into<String>,
        price: Pas,
        location: impl Into<String>,
    ) -> Result<Agent> {
        self.ensure_active()?;
        self.ensure_unregistered(caller)?;

        let agent = Agent::new(caller, name, email, service_type, price, location);
        self.agents.insert(caller, agent.clone());
        self.agent_index
            .write()
            .expect("agent index poisoned")
            .push(caller);

        info!(agent = %caller, name = %agent.name, service = %agent.service_type, "agent registered");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::AgentRegistered,
            caller,
            None,
            serde_json::json!({
                "name": agent.name,
                "service_type": agent.service_type,
                "price": agent.price.to_string(),
                "location": agent.location,
            }),
        )
        .await?;

        Ok(agent)
    }

    /// Toggle the caller's availability flag.
    pub async fn set_agent_availability(&self, caller: Uuid, available: bool) -> Result<()> {
        self.ensure_active()?;
        {
            let mut agent = self
                .agents
                .get_mut(&caller)
                .ok_or(SecureScoutError::AgentNotFound(caller))?;
            agent.is_available = available;
        }
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::AgentAvailabilityChanged,
            caller,
            None,
            serde_json::json!({"available": available}),
        )
        .await
    }

    /// Update the caller's advertised price.
    pub async fn update_agent_price(&self, caller: Uuid, price: Pas) -> Result<()> {
        self.ensure_active()?;
        {
            let mut agent = self
                .agents
                .get_mut(&caller)
                .ok_or(SecureScoutError::AgentNotFound(caller))?;
            agent.price = price;
        }
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::AgentPriceUpdated,
            caller,
            None,
            serde_json::json!({"price": price.to_string()}),
        )
        .await
    }

    /// Update the caller's location.
    pub async fn update_agent_location(
        &self,
        caller: Uuid,
        location: impl Into<String>,
    ) -> Result<()> {
        self.ensure_active()?;
        let location = location.into();
        {
            let mut agent = self
                .agents
                .get_mut(&caller)
                .ok_or(SecureScoutError::AgentNotFound(caller))?;
            agent.location = location.clone();
        }
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::AgentLocationUpdated,
            caller,
            None,
            serde_json::json!({"location": location}),
        )
        .await
    }

    /// Allow a component (the RatingRegistry) to move aggregate ratings.
    /// Owner only.
    pub fn grant_rating_authority(&self, caller: Uuid, authority: Uuid) -> Result<()> {
        self.ensure_owner(caller)?;
        self.rating_authorities.insert(authority, ());
        Ok(())
    }

    /// Fold a new rating into an agent's aggregate. Restricted to rating
    /// authorities. Returns the new scaled average.
    pub fn apply_agent_rating(&self, authority: Uuid, agent_id: Uuid, rating: u8) -> Result<u64> {
        self.ensure_rating_authority(authority)?;
        let mut agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(SecureScoutError::AgentNotFound(agent_id))?;
        agent.average_rating = rolling_average(agent.average_rating, agent.total_ratings, rating);
        agent.total_ratings += 1;
        Ok(agent.average_rating)
    }

    /// Fold a new rating into a scout's aggregate. Restricted to rating
    /// authorities. Returns the new scaled average.
    pub fn apply_scout_rating(&self, authority: Uuid, scout_id: Uuid, rating: u8) -> Result<u64> {
        self.ensure_rating_authority(authority)?;
        let mut scout = self
            .scouts
            .get_mut(&scout_id)
            .ok_or(SecureScoutError::ScoutNotFound(scout_id))?;
        scout.average_rating = rolling_average(scout.average_rating, scout.total_ratings, rating);
        scout.total_ratings += 1;
        Ok(scout.average_rating)
    }

    /// Replace one prior rating inside an agent's aggregate.
    pub fn amend_agent_rating(
        &self,
        authority: Uuid,
        agent_id: Uuid,
        old_rating: u8,
        new_rating: u8,
    ) -> Result<u64> {
        self.ensure_rating_authority(authority)?;
        let mut agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(SecureScoutError::AgentNotFound(agent_id))?;
        agent.average_rating = amended_average(
            agent.average_rating,
            agent.total_ratings,
            old_rating,
            new_rating,
        );
        Ok(agent.average_rating)
    }

    /// Replace one prior rating inside a scout's aggregate.
    pub fn amend_scout_rating(
        &self,
        authority: Uuid,
        scout_id: Uuid,
        old_rating: u8,
        new_rating: u8,
    ) -> Result<u64> {
        self.ensure_rating_authority(authority)?;
        let mut scout = self
            .scouts
            .get_mut(&scout_id)
            .ok_or(SecureScoutError::ScoutNotFound(scout_id))?;
        scout.average_rating = amended_average(
            scout.average_rating,
            scout.total_ratings,
            old_rating,
            new_rating,
        );
        Ok(scout.average_rating)
    }

    /// Bump a scout's posted-job counter. Called by the JobRegistry.
    pub fn record_job_posted(&self, scout_id: Uuid) -> Result<()> {
        let mut scout = self
            .scouts
            .get_mut(&scout_id)
            .ok_or(SecureScoutError::ScoutNotFound(scout_id))?;
        scout.total_jobs_posted += 1;
        Ok(())
    }

    /// Record a released payment against both parties' statistics.
    /// Called by the PaymentRegistry.
    pub fn record_payment(
        &self,
        scout_id: Uuid,
        agent_id: Uuid,
        gross: Pas,
        payout: Pas,
    ) -> Result<()> {
        {
            let mut scout = self
                .scouts
                .get_mut(&scout_id)
                .ok_or(SecureScoutError::ScoutNotFound(scout_id))?;
            scout.total_spent += gross;
        }
        let mut agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(SecureScoutError::AgentNotFound(agent_id))?;
        agent.completed_jobs += 1;
        agent.total_earnings += payout;
        Ok(())
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
            serde_json::json!({"registry": "users"}),
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
            serde_json::json!({"registry": "users"}),
        )
        .await
    }

    // ---- Views (never blocked by pause) ----

    pub fn get_scout(&self, account: Uuid) -> Result<Scout> {
        self.scouts
            .get(&account)
            .map(|s| s.clone())
            .ok_or(SecureScoutError::ScoutNotFound(account))
    }

    pub fn get_agent(&self, account: Uuid) -> Result<Agent> {
        self.agents
            .get(&account)
            .map(|a| a.clone())
            .ok_or(SecureScoutError::AgentNotFound(account))
    }

    pub fn is_scout(&self, account: Uuid) -> bool {
        self.scouts.contains_key(&account)
    }

    pub fn is_agent(&self, account: Uuid) -> bool {
        self.agents.contains_key(&account)
    }

    pub fn is_registered(&self, account: Uuid) -> bool {
        self.is_scout(account) || self.is_agent(account)
    }

    /// The role an account holds, if any.
    pub fn role_of(&self, account: Uuid) -> Option<Role> {
        if self.is_scout(account) {
            Some(Role::Scout)
        } else if self.is_agent(account) {
            Some(Role::Agent)
        } else {
            None
        }
    }

    pub fn scout_count(&self) -> usize {
        self.scouts.len()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent_at_index(&self, index: usize) -> Option<Agent> {
        let ids = self.agent_index.read().expect("agent index poisoned");
        ids.get(index)
            .and_then(|id| self.agents.get(id).map(|a| a.clone()))
    }

    /// Linear-scan pagination over the insertion-ordered agent list.
    pub fn agents_paginated(&self, start: usize, count: usize) -> Vec<Agent> {
        let ids = self.agent_index.read().expect("agent index poisoned");
        ids.iter()
            .skip(start)
            .take(count)
            .filter_map(|id| self.agents.get(id).map(|a| a.clone()))
            .collect()
    }

    pub fn available_agents(&self) -> Vec<Agent> {
        self.filtered_agents(|a| a.is_available && a.is_active)
    }

    pub fn agents_by_location(&self, location: &str) -> Vec<Agent> {
        self.filtered_agents(|a| a.is_active && a.matches_location(location))
    }

    pub fn agents_by_service(&self, service_type: &str) -> Vec<Agent> {
        self.filtered_agents(|a| a.is_active && a.matches_service(service_type))
    }

    fn filtered_agents(&self, predicate: impl Fn(&Agent) -> bool) -> Vec<Agent> {
        let ids = self.agent_index.read().expect("agent index poisoned");
        ids.iter()
            .filter_map(|id| self.agents.get(id).map(|a| a.clone()))
            .filter(|a| predicate(a))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securescout_ledger::InMemoryLedger;
    use securescout_types::ONE_PAS;

    fn registry() -> (UserRegistry, Uuid) {
        let owner = Uuid::new_v4();
        let ledger = Arc::new(InMemoryLedger::new());
        (UserRegistry::new(owner, ledger), owner)
    }

    async fn register_agent(reg: &UserRegistry, name: &str, service: &str, location: &str) -> Uuid {
        let id = Uuid::new_v4();
        reg.register_agent(id, name, "a@example.com", service, ONE_PAS, location)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_role_exclusivity() {
        let (reg, _) = registry();
        let account = Uuid::new_v4();

        reg.register_scout(account, "ada", "ada@example.com", "Lisbon")
            .await
            .unwrap();

        assert_eq!(reg.role_of(account), Some(Role::Scout));

        // Same account cannot become an agent, nor re-register as a scout.
        let err = reg
            .register_agent(account, "ada", "ada@example.com", "photo", ONE_PAS, "Lisbon")
            .await
            .unwrap_err();
        assert!(matches!(err, SecureScoutError::AlreadyRegistered(a) if a == account));
        assert_eq!(reg.role_of(account), Some(Role::Scout));
        assert_eq!(reg.role_of(Uuid::new_v4()), None);
        assert!(
            reg.register_scout(account, "ada", "ada@example.com", "Lisbon")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_agent_then_scout_rejected() {
        let (reg, _) = registry();
        let account = register_agent(&reg, "bob", "photo", "Porto").await;
        let err = reg
            .register_scout(account, "bob", "b@example.com", "Porto")
            .await
            .unwrap_err();
        assert!(matches!(err, SecureScoutError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn test_profile_updates() {
        let (reg, _) = registry();
        let agent = register_agent(&reg, "bob", "photo", "Porto").await;

        reg.set_agent_availability(agent, false).await.unwrap();
        reg.update_agent_price(agent, 3 * ONE_PAS).await.unwrap();
        reg.update_agent_location(agent, "Faro").await.unwrap();

        let stored = reg.get_agent(agent).unwrap();
        assert!(!stored.is_available);
        assert_eq!(stored.price, 3 * ONE_PAS);
        assert_eq!(stored.location, "Faro");
    }

    #[tokio::test]
    async fn test_updates_require_agent_role() {
        let (reg, _) = registry();
        let scout = Uuid::new_v4();
        reg.register_scout(scout, "ada", "a@example.com", "Lisbon")
            .await
            .unwrap();
        assert!(matches!(
            reg.set_agent_availability(scout, false).await,
            Err(SecureScoutError::AgentNotFound(_))
        ));
        assert!(reg.update_agent_price(Uuid::new_v4(), 1).await.is_err());
    }

    #[tokio::test]
    async fn test_pagination_bounds() {
        let (reg, _) = registry();
        for i in 0..5 {
            register_agent(&reg, &format!("agent-{i}"), "photo", "Porto").await;
        }

        assert_eq!(reg.agents_paginated(0, 2).len(), 2);
        assert_eq!(reg.agents_paginated(4, 10).len(), 1);
        assert!(reg.agents_paginated(5, 10).is_empty());
        assert_eq!(reg.agent_count(), 5);

        // Insertion order is stable.
        let page = reg.agents_paginated(1, 2);
        assert_eq!(page[0].name, "agent-1");
        assert_eq!(page[1].name, "agent-2");
        assert_eq!(reg.agent_at_index(0).unwrap().name, "agent-0");
        assert!(reg.agent_at_index(9).is_none());
    }

    #[tokio::test]
    async fn test_filters() {
        let (reg, _) = registry();
        let porto = register_agent(&reg, "a", "photo", "Porto").await;
        register_agent(&reg, "b", "plumbing", "Lisbon").await;
        let busy = register_agent(&reg, "c", "photo", "Porto").await;
        reg.set_agent_availability(busy, false).await.unwrap();

        assert_eq!(reg.agents_by_location("porto").len(), 2);
        assert_eq!(reg.agents_by_service("PHOTO").len(), 2);
        let available = reg.available_agents();
        assert_eq!(available.len(), 2);
        assert!(available.iter().any(|a| a.id == porto));
        assert!(!available.iter().any(|a| a.id == busy));
    }

    #[tokio::test]
    async fn test_rating_authority_gate() {
        let (reg, owner) = registry();
        let agent = register_agent(&reg, "bob", "photo", "Porto").await;
        let rating_registry = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        // Unauthorized callers cannot move aggregates.
        assert!(matches!(
            reg.apply_agent_rating(stranger, agent, 5),
            Err(SecureScoutError::NotAuthorized(_))
        ));

        reg.grant_rating_authority(owner, rating_registry).unwrap();
        assert_eq!(reg.apply_agent_rating(rating_registry, agent, 5).unwrap(), 500);
        assert_eq!(reg.apply_agent_rating(rating_registry, agent, 4).unwrap(), 450);

        let stored = reg.get_agent(agent).unwrap();
        assert_eq!(stored.total_ratings, 2);
        assert_eq!(stored.average_rating, 450);

        // Amendment replaces a prior rating without changing the count.
        assert_eq!(reg.amend_agent_rating(rating_registry, agent, 4, 5).unwrap(), 500);
        assert_eq!(reg.get_agent(agent).unwrap().total_ratings, 2);
    }

    #[tokio::test]
    async fn test_grant_authority_owner_only() {
        let (reg, _) = registry();
        let stranger = Uuid::new_v4();
        assert!(matches!(
            reg.grant_rating_authority(stranger, Uuid::new_v4()),
            Err(SecureScoutError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_payment_statistics() {
        let (reg, _) = registry();
        let scout = Uuid::new_v4();
        reg.register_scout(scout, "ada", "a@example.com", "Lisbon")
            .await
            .unwrap();
        let agent = register_agent(&reg, "bob", "photo", "Porto").await;

        reg.record_job_posted(scout).unwrap();
        reg.record_payment(scout, agent, 10 * ONE_PAS, 9 * ONE_PAS)
            .unwrap();

        let s = reg.get_scout(scout).unwrap();
        assert_eq!(s.total_jobs_posted, 1);
        assert_eq!(s.total_spent, 10 * ONE_PAS);
        let a = reg.get_agent(agent).unwrap();
        assert_eq!(a.completed_jobs, 1);
        assert_eq!(a.total_earnings, 9 * ONE_PAS);
    }

    #[tokio::test]
    async fn test_pause_blocks_mutations_not_views() {
        let (reg, owner) = registry();
        let agent = register_agent(&reg, "bob", "photo", "Porto").await;

        assert!(reg.pause(Uuid::new_v4()).await.is_err());
        reg.pause(owner).await.unwrap();

        assert!(matches!(
            reg.register_scout(Uuid::new_v4(), "x", "x@example.com", "y").await,
            Err(SecureScoutError::RegistryPaused)
        ));
        assert!(matches!(
            reg.set_agent_availability(agent, false).await,
            Err(SecureScoutError::RegistryPaused)
        ));

        // Views keep working while paused.
        assert!(reg.get_agent(agent).is_ok());
        assert_eq!(reg.agents_paginated(0, 10).len(), 1);

        reg.unpause(owner).await.unwrap();
        assert!(reg.set_agent_availability(agent, false).await.is_ok());
    }
}
