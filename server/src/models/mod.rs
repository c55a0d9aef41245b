pub mod event;
pub mod payment;
pub mod price;
pub mod redemption;
pub mod report;
pub mod ticket;
pub mod venue;

pub use event::{EventInfo, EventKey, EventListing, TicketType};
pub use payment::PaymentMetadata;
pub use redemption::RedemptionOutcome;
pub use report::{EventTally, RevenueReport, TypeTally};
pub use ticket::{Holder, Ticket, TicketCode, TicketInfo};
pub use venue::{Venue, VenueId};
