use std::sync::Arc;

use crate::config::{Config, ScanConfig};
use crate::services::{EventCatalog, RedemptionGate, RevenueAggregator, TicketAllocator};
use crate::store::LedgerStore;

/// Services shared by every request, all backed by one ledger.
#[derive(Clone)]
pub struct AppState {
    pub catalog: EventCatalog,
    pub allocator: TicketAllocator,
    pub gate: RedemptionGate,
    pub aggregator: RevenueAggregator,
    pub scan: Arc<ScanConfig>,
}

impl AppState {
    pub fn new(ledger: Arc<dyn LedgerStore>, config: &Config) -> Self {
        Self {
            catalog: EventCatalog::new(ledger.clone()),
            allocator: TicketAllocator::with_max_attempts(ledger.clone(), config.allocation_max_attempts),
            gate: RedemptionGate::new(ledger.clone(), config.scan.lookup_timeout),
            aggregator: RevenueAggregator::new(ledger),
            scan: Arc::new(config.scan.clone()),
        }
    }
}
