pub mod aggregator;
pub mod allocator;
pub mod catalog;
pub mod codec;
pub mod gate;

pub use aggregator::RevenueAggregator;
pub use allocator::{AllocationError, TicketAllocator, TicketRequest};
pub use catalog::{CatalogError, EventCatalog};
pub use codec::DecodeError;
pub use gate::RedemptionGate;
