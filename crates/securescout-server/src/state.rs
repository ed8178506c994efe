use std::sync::Arc;

use uuid::Uuid;

use securescout_hub::SecureScoutHub;
use securescout_ledger::{InMemoryLedger, Ledger};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<SecureScoutHub>,
    pub ledger: Arc<dyn Ledger>,
}

impl AppState {
    pub fn new(owner: Uuid, platform_fee_bps: u16) -> Self {
        let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        let hub = SecureScoutHub::bootstrap(owner, platform_fee_bps, ledger.clone())
            .expect("hub wiring cannot fail on a fresh stack");

        Self {
            hub: Arc::new(hub),
            ledger,
        }
    }
}
