use std::sync::Arc;

use uuid::Uuid;

use securescout_hub::SecureScoutHub;
use securescout_ledger::{InMemoryLedger, Ledger};

/// Shared application state for CLI commands. Built fresh per run, like
/// each diagnostic script opening its own connection.
pub struct AppState {
    pub owner: Uuid,
    pub hub: Arc<SecureScoutHub>,
    pub ledger: Arc<dyn Ledger>,
}

impl AppState {
    pub fn new(platform_fee_bps: u16) -> Self {
        let owner = Uuid::new_v4();
        let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        let hub = SecureScoutHub::bootstrap(owner, platform_fee_bps, ledger.clone())
            .expect("hub wiring cannot fail on a fresh stack");

        Self {
            owner,
            hub: Arc::new(hub),
            ledger,
        }
    }
}
