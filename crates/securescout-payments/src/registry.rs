use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use securescout_jobs::JobRegistry;
use securescout_ledger::{Ledger, LedgerEntryKind, append_chained};
use securescout_types::{
    JobId, JobStatus, Pas, Result, SecureScoutError, net_payout, platform_fee,
};
use securescout_users::UserRegistry;

/// A released payment, split into the agent's payout and the platform cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedPayment {
    pub gross: Pas,
    pub fee: Pas,
    pub payout: Pas,
}

/// Escrow and fee ledger. Authorization leans on the UserRegistry and
/// JobRegistry; balances here are authoritative, with the job's
/// `escrow_amount` as a read-side mirror. Withdrawals follow the pull
/// pattern: balances accrue and are zeroed when claimed.
pub struct PaymentRegistry {
    owner: Uuid,
    paused: AtomicBool,
    platform_fee_bps: u16,
    escrow: DashMap<JobId, Pas>,
    released: DashMap<JobId, ()>,
    agent_earnings: DashMap<Uuid, Pas>,
    platform_fees: Mutex<Pas>,
    users: Arc<UserRegistry>,
    jobs: Arc<JobRegistry>,
    ledger: Arc<dyn Ledger>,
}

impl PaymentRegistry {
    pub fn new(
        owner: Uuid,
        platform_fee_bps: u16,
        users: Arc<UserRegistry>,
        jobs: Arc<JobRegistry>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            owner,
            paused: AtomicBool::new(false),
            platform_fee_bps,
            escrow: DashMap::new(),
            released: DashMap::new(),
            agent_earnings: DashMap::new(),
            platform_fees: Mutex::new(0),
            users,
            jobs,
            ledger,
        }
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn platform_fee_bps(&self) -> u16 {
        self.platform_fee_bps
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

    fn ensure_scout_or_owner(&self, caller: Uuid, scout: Uuid) -> Result<()> {
        if caller != scout && caller != self.owner {
            return Err(SecureScoutError::NotAuthorized(format!(
                "{caller} is neither the posting scout nor the owner"
            )));
        }
        Ok(())
    }

    /// Fund a freshly posted job's escrow. The deposit must match the
    /// budget exactly and can happen once.
    pub async fn deposit_funds(&self, caller: Uuid, job_id: JobId, amount: Pas) -> Result<()> {
        self.ensure_active()?;
        let job = self.jobs.get_job(job_id)?;
        if !job.is_scout(caller) {
            return Err(SecureScoutError::NotAuthorized(format!(
                "only the posting scout can fund job {job_id}"
            )));
        }
        if job.status != JobStatus::Open {
            return Err(SecureScoutError::JobNotOpen(job_id));
        }
        if self.escrow.contains_key(&job_id) {
            return Err(SecureScoutError::EscrowAlreadyFunded(job_id));
        }
        if amount != job.budget {
            return Err(SecureScoutError::InsufficientDeposit {
                expected: job.budget,
                actual: amount,
            });
        }

        self.escrow.insert(job_id, amount);

        info!(job = job_id, amount = %amount, "escrow funded");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::FundsDeposited,
            caller,
            Some(job_id),
            serde_json::json!({"amount": amount.to_string()}),
        )
        .await
    }

    /// Release a completed job's escrow to its agent, minus the platform
    /// fee. Posting scout (approval) or owner (dispute settlement).
    pub async fn release_payment(&self, caller: Uuid, job_id: JobId) -> Result<ReleasedPayment> {
        self.ensure_active()?;
        let job = self.jobs.get_job(job_id)?;
        if job.status != JobStatus::Completed {
            return Err(SecureScoutError::CompletionNotPending(job_id));
        }
        self.ensure_scout_or_owner(caller, job.scout)?;
        if self.released.contains_key(&job_id) {
            return Err(SecureScoutError::PaymentAlreadyReleased(job_id));
        }
        let agent = job
            .assigned_agent
            .ok_or_else(|| SecureScoutError::Internal("completed job has no agent".into()))?;
        let gross = *self
            .escrow
            .get(&job_id)
            .ok_or(SecureScoutError::EscrowNotFound(job_id))?;

        let fee = platform_fee(gross, self.platform_fee_bps);
        let payout = net_payout(gross, self.platform_fee_bps);

        // Checks done; apply effects.
        self.escrow.remove(&job_id);
        self.released.insert(job_id, ());
        *self.agent_earnings.entry(agent).or_insert(0) += payout;
        *self.platform_fees.lock().expect("fee accrual poisoned") += fee;
        self.users.record_payment(job.scout, agent, gross, payout)?;

        info!(job = job_id, agent = %agent, payout = %payout, fee = %fee, "payment released");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::PaymentReleased,
            caller,
            Some(job_id),
            serde_json::json!({
                "agent": agent,
                "gross": gross.to_string(),
                "fee": fee.to_string(),
                "payout": payout.to_string(),
            }),
        )
        .await?;

        Ok(ReleasedPayment { gross, fee, payout })
    }

    /// Return a cancelled job's full escrow to its scout.
    pub async fn refund_payment(&self, caller: Uuid, job_id: JobId) -> Result<Pas> {
        self.ensure_active()?;
        let job = self.jobs.get_job(job_id)?;
        if job.status != JobStatus::Cancelled {
            return Err(SecureScoutError::JobNotCancelled(job_id));
        }
        self.ensure_scout_or_owner(caller, job.scout)?;
        if self.released.contains_key(&job_id) {
            return Err(SecureScoutError::PaymentAlreadyReleased(job_id));
        }
        let (_, amount) = self
            .escrow
            .remove(&job_id)
            .ok_or(SecureScoutError::EscrowNotFound(job_id))?;

        info!(job = job_id, amount = %amount, "escrow refunded");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::PaymentRefunded,
            caller,
            Some(job_id),
            serde_json::json!({"amount": amount.to_string()}),
        )
        .await?;

        Ok(amount)
    }

    /// Claim accrued earnings. Pull pattern: zeroes the balance and
    /// returns what was claimed.
    pub async fn withdraw_earnings(&self, caller: Uuid) -> Result<Pas> {
        self.ensure_active()?;
        let amount = match self.agent_earnings.remove(&caller) {
            Some((_, amount)) if amount > 0 => amount,
            _ => return Err(SecureScoutError::NothingToWithdraw(caller)),
        };

        info!(agent = %caller, amount = %amount, "earnings withdrawn");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::EarningsWithdrawn,
            caller,
            None,
            serde_json::json!({"amount": amount.to_string()}),
        )
        .await?;

        Ok(amount)
    }

    /// Claim accrued platform fees. Owner only.
    pub async fn withdraw_platform_fees(&self, caller: Uuid) -> Result<Pas> {
        self.ensure_active()?;
        self.ensure_owner(caller)?;
        let amount = {
            let mut fees = self.platform_fees.lock().expect("fee accrual poisoned");
            if *fees == 0 {
                return Err(SecureScoutError::NothingToWithdraw(caller));
            }
            std::mem::take(&mut *fees)
        };

        info!(amount = %amount, "platform fees withdrawn");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::PlatformFeesWithdrawn,
            caller,
            None,
            serde_json::json!({"amount": amount.to_string()}),
        )
        .await?;

        Ok(amount)
    }

    /// Owner escape hatch: drain a job's escrow regardless of job state.
    /// Deliberately usable while paused.
    pub async fn emergency_withdraw(&self, caller: Uuid, job_id: JobId) -> Result<Pas> {
        self.ensure_owner(caller)?;
        let (_, amount) = self
            .escrow
            .remove(&job_id)
            .ok_or(SecureScoutError::EscrowNotFound(job_id))?;

        info!(job = job_id, amount = %amount, "emergency withdrawal");
        append_chained(
            self.ledger.as_ref(),
            LedgerEntryKind::EmergencyWithdrawal,
            caller,
            Some(job_id),
            serde_json::json!({"amount": amount.to_string()}),
        )
        .await?;

        Ok(amount)
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
            serde_json::json!({"registry": "payments"}),
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
            serde_json::json!({"registry": "payments"}),
        )
        .await
    }

    // ---- Views (never blocked by pause) ----

    pub fn escrow_balance(&self, job_id: JobId) -> Pas {
        self.escrow.get(&job_id).map(|v| *v).unwrap_or(0)
    }

    pub fn pending_earnings(&self, agent: Uuid) -> Pas {
        self.agent_earnings.get(&agent).map(|v| *v).unwrap_or(0)
    }

    pub fn is_released(&self, job_id: JobId) -> bool {
        self.released.contains_key(&job_id)
    }

    pub fn accrued_platform_fees(&self) -> Pas {
        *self.platform_fees.lock().expect("fee accrual poisoned")
    }
}
