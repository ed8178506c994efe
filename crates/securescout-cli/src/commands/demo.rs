use anyhow::Result;
use uuid::Uuid;

use securescout_jobs::PostJobRequest;
use securescout_types::{ONE_PAS, Pas};

use crate::state::AppState;

fn pas(amount: Pas) -> String {
    let whole = amount / ONE_PAS;
    let frac = amount % ONE_PAS / (ONE_PAS / 10_000);
    if frac == 0 {
        format!("{whole} PAS")
    } else {
        format!("{whole}.{frac:04} PAS")
    }
}

/// Run the whole marketplace lifecycle once, narrating each step.
pub async fn handle(state: &AppState) -> Result<()> {
    let hub = &state.hub;

    println!("== SecureScout demo ==");
    println!("hub owner: {}", state.owner);
    println!(
        "platform fee: {} bps\n",
        hub.payments().platform_fee_bps()
    );

    let scout = Uuid::new_v4();
    hub.register_scout(scout, "ada", "ada@example.com", "Lisbon")
        .await?;
    println!("registered scout ada      {scout}");

    let agent = Uuid::new_v4();
    hub.register_agent(agent, "bob", "bob@example.com", "venue scouting", 2 * ONE_PAS, "Lisbon")
        .await?;
    println!("registered agent bob      {agent}");

    let budget = 10 * ONE_PAS;
    let job = hub
        .post_job_request(
            scout,
            PostJobRequest {
                title: "Venue scouting".into(),
                description: "Find three candidate venues and photograph each".into(),
                location: "Lisbon".into(),
                budget,
                preferred_agent: None,
                deadline: None,
            },
            budget,
        )
        .await?;
    println!(
        "posted job #{}            budget {}, escrow {}",
        job.id,
        pas(budget),
        pas(hub.get_escrow_balance(job.id))
    );

    hub.apply_for_job(agent, job.id).await?;
    println!("bob applied");

    hub.accept_agent(scout, job.id, agent).await?;
    println!("ada accepted bob");

    hub.start_job(agent, job.id).await?;
    hub.update_job_progress(agent, job.id, 60, "two venues shot").await?;
    println!("bob started work, progress 60%");

    hub.submit_job_completion(
        agent,
        job.id,
        "three venues, 24 photos",
        vec!["https://proofs/venues.zip".into()],
    )
    .await?;
    println!("bob submitted completion");

    let released = hub.approve_job_completion(scout, job.id).await?;
    println!(
        "ada approved              payout {} to bob, fee {}",
        pas(released.payout),
        pas(released.fee)
    );

    hub.rate_agent(scout, job.id, 5, "found a gem").await?;
    hub.rate_scout(agent, job.id, 4, "prompt payment").await?;
    println!("both parties rated");

    let withdrawn = hub.withdraw_earnings(agent).await?;
    println!("bob withdrew              {}", pas(withdrawn));

    println!("\n== final state ==");
    println!("escrow for job #{}:       {}", job.id, pas(hub.get_escrow_balance(job.id)));
    println!(
        "platform fees accrued:    {}",
        pas(hub.payments().accrued_platform_fees())
    );
    let (avg, count) = hub.get_agent_rating(agent)?;
    println!("bob's rating:             {:.2} ({count} review)", avg as f64 / 100.0);

    let entries = state.ledger.all_entries().await?;
    let ok = state.ledger.verify_integrity().await?;
    println!("ledger entries:           {}", entries.len());
    println!("ledger chain verified:    {ok}");
    for entry in &entries {
        let job = entry
            .job_id
            .map(|j| format!(" job #{j}"))
            .unwrap_or_default();
        println!("  {:?}{}", entry.kind, job);
    }

    Ok(())
}
