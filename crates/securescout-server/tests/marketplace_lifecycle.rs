use std::sync::Arc;

use uuid::Uuid;

use securescout_hub::SecureScoutHub;
use securescout_jobs::PostJobRequest;
use securescout_ledger::{InMemoryLedger, Ledger};
use securescout_types::{JobStatus, ONE_PAS, SecureScoutError};

const FEE_BPS: u16 = 250; // 2.5%

fn hub() -> (Arc<SecureScoutHub>, Arc<dyn Ledger>, Uuid) {
    let owner = Uuid::new_v4();
    let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
    let hub = SecureScoutHub::bootstrap(owner, FEE_BPS, ledger.clone()).unwrap();
    (Arc::new(hub), ledger, owner)
}

fn job_request(budget: u128) -> PostJobRequest {
    PostJobRequest {
        title: "Venue scouting".into(),
        description: "Find three candidate venues and photograph each".into(),
        location: "Lisbon".into(),
        budget,
        preferred_agent: None,
        deadline: None,
    }
}

/// The full happy path: post with escrow, apply, accept, start, progress,
/// submit, approve. Money ends up where it should, and the audit chain
/// verifies.
#[tokio::test]
async fn test_full_marketplace_lifecycle() {
    let (hub, ledger, _) = hub();

    let scout = Uuid::new_v4();
    hub.register_scout(scout, "ada", "ada@example.com", "Lisbon")
        .await
        .unwrap();
    let agent = Uuid::new_v4();
    hub.register_agent(agent, "bob", "bob@example.com", "scouting", 2 * ONE_PAS, "Lisbon")
        .await
        .unwrap();

    // Post with a 10 PAS budget; escrow matches immediately.
    let job = hub
        .post_job_request(scout, job_request(10 * ONE_PAS), 10 * ONE_PAS)
        .await
        .unwrap();
    assert_eq!(hub.get_escrow_balance(job.id), 10 * ONE_PAS);
    assert_eq!(job.status, JobStatus::Open);

    hub.apply_for_job(agent, job.id).await.unwrap();
    assert_eq!(hub.get_job_applications(job.id).unwrap(), vec![agent]);

    let job_state = hub.accept_agent(scout, job.id, agent).await.unwrap();
    assert_eq!(job_state.status, JobStatus::Assigned);

    hub.start_job(agent, job.id).await.unwrap();
    hub.update_job_progress(agent, job.id, 60, "two venues shot")
        .await
        .unwrap();

    let job_state = hub
        .submit_job_completion(
            agent,
            job.id,
            "three venues, 24 photos",
            vec!["https://proofs/venues.zip".into()],
        )
        .await
        .unwrap();
    assert_eq!(job_state.status, JobStatus::Completed);
    assert!(job_state.is_completed);
    assert!(!job_state.is_paid);

    let released = hub.approve_job_completion(scout, job.id).await.unwrap();
    let expected_fee = 10 * ONE_PAS * FEE_BPS as u128 / 10_000;
    assert_eq!(released.fee, expected_fee);
    assert_eq!(released.payout, 10 * ONE_PAS - expected_fee);

    // Escrow is gone, earnings and fee accruals are exact.
    assert_eq!(hub.get_escrow_balance(job.id), 0);
    assert_eq!(hub.get_pending_payments(agent), released.payout);
    assert_eq!(hub.payments().accrued_platform_fees(), expected_fee);
    assert_eq!(hub.get_agent(agent).unwrap().total_earnings, released.payout);
    assert_eq!(hub.get_scout(scout).unwrap().total_spent, 10 * ONE_PAS);

    // The agent pulls its earnings.
    assert_eq!(hub.withdraw_earnings(agent).await.unwrap(), released.payout);
    assert_eq!(hub.get_pending_payments(agent), 0);

    // Every step landed on the audit chain, in order.
    assert!(ledger.verify_integrity().await.unwrap());
    assert!(!ledger.entries_for_job(job.id).await.unwrap().is_empty());
}

/// Both parties review each other after completion, and the aggregate
/// averages land on the profiles.
#[tokio::test]
async fn test_post_completion_reviews() {
    let (hub, _, _) = hub();

    let scout = Uuid::new_v4();
    hub.register_scout(scout, "ada", "ada@example.com", "Lisbon")
        .await
        .unwrap();
    let agent = Uuid::new_v4();
    hub.register_agent(agent, "bob", "bob@example.com", "scouting", ONE_PAS, "Lisbon")
        .await
        .unwrap();

    let job = hub
        .post_job_request(scout, job_request(ONE_PAS), ONE_PAS)
        .await
        .unwrap();
    hub.apply_for_job(agent, job.id).await.unwrap();
    hub.accept_agent(scout, job.id, agent).await.unwrap();
    hub.start_job(agent, job.id).await.unwrap();
    hub.submit_job_completion(agent, job.id, "done", vec![])
        .await
        .unwrap();
    hub.approve_job_completion(scout, job.id).await.unwrap();

    hub.rate_agent(scout, job.id, 5, "found a gem").await.unwrap();
    hub.rate_scout(agent, job.id, 4, "prompt payment").await.unwrap();

    assert_eq!(hub.get_agent_rating(agent).unwrap(), (500, 1));
    assert_eq!(hub.get_scout_rating(scout).unwrap(), (400, 1));
    assert_eq!(hub.get_job_reviews(job.id).len(), 2);

    // The scout amends its review; the count stays, the average moves.
    hub.update_review(scout, job.id, 3, "gem had mold").await.unwrap();
    assert_eq!(hub.get_agent_rating(agent).unwrap(), (300, 1));
}

/// Cancellation refunds the full escrow.
#[tokio::test]
async fn test_cancel_refunds_escrow() {
    let (hub, _, _) = hub();

    let scout = Uuid::new_v4();
    hub.register_scout(scout, "ada", "ada@example.com", "Lisbon")
        .await
        .unwrap();

    let job = hub
        .post_job_request(scout, job_request(10 * ONE_PAS), 10 * ONE_PAS)
        .await
        .unwrap();
    assert_eq!(hub.get_escrow_balance(job.id), 10 * ONE_PAS);

    let refunded = hub.cancel_job_request(scout, job.id).await.unwrap();
    assert_eq!(refunded, 10 * ONE_PAS);
    assert_eq!(hub.get_escrow_balance(job.id), 0);
    assert_eq!(hub.get_job_request(job.id).unwrap().status, JobStatus::Cancelled);
}

/// Registering under one role permanently blocks the other.
#[tokio::test]
async fn test_role_exclusivity_end_to_end() {
    let (hub, _, _) = hub();
    let account = Uuid::new_v4();

    hub.register_scout(account, "ada", "ada@example.com", "Lisbon")
        .await
        .unwrap();
    assert!(matches!(
        hub.register_agent(account, "ada", "ada@example.com", "scouting", ONE_PAS, "Lisbon")
            .await,
        Err(SecureScoutError::AlreadyRegistered(_))
    ));

    let other = Uuid::new_v4();
    hub.register_agent(other, "bob", "bob@example.com", "scouting", ONE_PAS, "Porto")
        .await
        .unwrap();
    assert!(matches!(
        hub.register_scout(other, "bob", "bob@example.com", "Porto").await,
        Err(SecureScoutError::AlreadyRegistered(_))
    ));
}

/// The emergency pause stops every mutating entry point across all four
/// registries and leaves every view working; unpause restores service.
#[tokio::test]
async fn test_emergency_pause_end_to_end() {
    let (hub, ledger, owner) = hub();

    let scout = Uuid::new_v4();
    hub.register_scout(scout, "ada", "ada@example.com", "Lisbon")
        .await
        .unwrap();
    let agent = Uuid::new_v4();
    hub.register_agent(agent, "bob", "bob@example.com", "scouting", ONE_PAS, "Porto")
        .await
        .unwrap();
    let job = hub
        .post_job_request(scout, job_request(ONE_PAS), ONE_PAS)
        .await
        .unwrap();

    hub.emergency_pause(owner).await.unwrap();

    assert!(matches!(
        hub.apply_for_job(agent, job.id).await,
        Err(SecureScoutError::RegistryPaused)
    ));
    assert!(matches!(
        hub.cancel_job_request(scout, job.id).await,
        Err(SecureScoutError::RegistryPaused)
    ));
    assert!(matches!(
        hub.set_agent_availability(agent, false).await,
        Err(SecureScoutError::RegistryPaused)
    ));

    // Views are unaffected.
    assert_eq!(hub.get_escrow_balance(job.id), ONE_PAS);
    assert_eq!(hub.get_job_request(job.id).unwrap().status, JobStatus::Open);
    assert_eq!(hub.users().agents_paginated(0, 10).len(), 1);
    assert!(ledger.verify_integrity().await.unwrap());

    hub.emergency_unpause(owner).await.unwrap();
    hub.apply_for_job(agent, job.id).await.unwrap();
    hub.accept_agent(scout, job.id, agent).await.unwrap();
}

/// A dispute freezes the job; the owner settles it either way.
#[tokio::test]
async fn test_dispute_settlement_end_to_end() {
    let (hub, _, owner) = hub();

    let scout = Uuid::new_v4();
    hub.register_scout(scout, "ada", "ada@example.com", "Lisbon")
        .await
        .unwrap();
    let agent = Uuid::new_v4();
    hub.register_agent(agent, "bob", "bob@example.com", "scouting", ONE_PAS, "Porto")
        .await
        .unwrap();

    let job = hub
        .post_job_request(scout, job_request(4 * ONE_PAS), 4 * ONE_PAS)
        .await
        .unwrap();
    hub.apply_for_job(agent, job.id).await.unwrap();
    hub.accept_agent(scout, job.id, agent).await.unwrap();
    hub.start_job(agent, job.id).await.unwrap();

    hub.dispute_job(scout, job.id, "no updates in a week")
        .await
        .unwrap();
    let frozen = hub.get_job_request(job.id).unwrap();
    assert_eq!(frozen.status, JobStatus::Disputed);

    // Nobody but the owner can settle, and the lifecycle is frozen.
    assert!(hub.start_job(agent, job.id).await.is_err());
    assert!(hub.resolve_dispute(scout, job.id, false).await.is_err());

    let released = hub.resolve_dispute(owner, job.id, true).await.unwrap().unwrap();
    assert_eq!(released.gross, 4 * ONE_PAS);
    assert_eq!(hub.get_escrow_balance(job.id), 0);
    assert_eq!(hub.get_pending_payments(agent), released.payout);
}
