use anyhow::{Result, bail};
use uuid::Uuid;

use securescout_jobs::PostJobRequest;
use securescout_types::{JobStatus, ONE_PAS, Pas, platform_fee};

use crate::state::AppState;

/// Drive a mixed workload through the hub, then check the invariants the
/// registries are supposed to hold. Non-zero exit on any violation.
pub async fn handle(state: &AppState, jobs: u32) -> Result<()> {
    let hub = &state.hub;
    let fee_bps = hub.payments().platform_fee_bps();

    let scout = Uuid::new_v4();
    hub.register_scout(scout, "auditor-scout", "scout@audit.local", "Lisbon")
        .await?;
    let agent = Uuid::new_v4();
    hub.register_agent(
        agent,
        "auditor-agent",
        "agent@audit.local",
        "auditing",
        ONE_PAS,
        "Lisbon",
    )
    .await?;

    let mut expected_payouts: Pas = 0;
    let mut expected_fees: Pas = 0;
    let mut expected_spent: Pas = 0;
    let mut approved = 0u32;
    let mut cancelled = 0u32;
    let mut disputed = 0u32;

    for i in 0..jobs {
        let budget = (i as u128 + 1) * ONE_PAS;
        let job = hub
            .post_job_request(
                scout,
                PostJobRequest {
                    title: format!("audit job {i}"),
                    description: "workload".into(),
                    location: "Lisbon".into(),
                    budget,
                    preferred_agent: None,
                    deadline: None,
                },
                budget,
            )
            .await?;

        match i % 4 {
            // Full happy path.
            0 | 1 => {
                hub.apply_for_job(agent, job.id).await?;
                hub.accept_agent(scout, job.id, agent).await?;
                hub.start_job(agent, job.id).await?;
                hub.submit_job_completion(agent, job.id, "done", vec![]).await?;
                let released = hub.approve_job_completion(scout, job.id).await?;
                expected_payouts += released.payout;
                expected_fees += released.fee;
                expected_spent += budget;
                if released.fee != platform_fee(budget, fee_bps) {
                    bail!("fee mismatch on job {}", job.id);
                }
                approved += 1;
            }
            // Cancelled before assignment.
            2 => {
                let refunded = hub.cancel_job_request(scout, job.id).await?;
                if refunded != budget {
                    bail!("refund mismatch on job {}: {refunded} != {budget}", job.id);
                }
                cancelled += 1;
            }
            // Disputed mid-flight, settled for the agent.
            _ => {
                hub.apply_for_job(agent, job.id).await?;
                hub.accept_agent(scout, job.id, agent).await?;
                hub.start_job(agent, job.id).await?;
                hub.dispute_job(scout, job.id, "audit dispute").await?;
                let released = hub
                    .resolve_dispute(state.owner, job.id, true)
                    .await?
                    .expect("settlement in the agent's favor releases");
                expected_payouts += released.payout;
                expected_fees += released.fee;
                expected_spent += budget;
                disputed += 1;
            }
        }
    }

    println!("workload: {approved} approved, {cancelled} cancelled, {disputed} disputed");

    // Every settled job must hold zero escrow.
    for id in 1..=hub.jobs().job_count() {
        let job = hub.get_job_request(id)?;
        if hub.get_escrow_balance(id) != 0 {
            bail!("job {id} still holds escrow after settlement");
        }
        if job.status == JobStatus::Open || job.status == JobStatus::Disputed {
            bail!("job {id} did not settle: {:?}", job.status);
        }
    }

    // Money conservation across the whole run.
    if hub.get_pending_payments(agent) != expected_payouts {
        bail!(
            "pending earnings {} != expected {}",
            hub.get_pending_payments(agent),
            expected_payouts
        );
    }
    if hub.payments().accrued_platform_fees() != expected_fees {
        bail!("platform fee accrual mismatch");
    }
    let profile = hub.get_scout(scout)?;
    if profile.total_spent != expected_spent {
        bail!("scout total_spent {} != expected {}", profile.total_spent, expected_spent);
    }

    // The audit chain itself.
    if !state.ledger.verify_integrity().await? {
        bail!("ledger hash chain does not verify");
    }
    let entries = state.ledger.all_entries().await?.len();

    println!("escrow invariants:   ok");
    println!("money conservation:  ok");
    println!("ledger chain:        ok ({entries} entries)");
    Ok(())
}
