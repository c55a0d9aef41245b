use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::event::EventKey;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeTally {
    pub tickets: u64,
    pub revenue: Decimal,
}

/// Sales and attendance for one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTally {
    pub event: EventKey,
    /// High-water mark of the event's ticket numbering.
    pub tickets_sold: u64,
    pub revenue: Decimal,
    /// Tickets already redeemed at the door.
    pub attended: u64,
    /// Sum of advisory capacities, when every ticket type declares one.
    pub capacity: Option<u32>,
    pub by_type: BTreeMap<String, TypeTally>,
}

impl EventTally {
    pub fn empty(event: EventKey) -> Self {
        Self {
            event,
            tickets_sold: 0,
            revenue: Decimal::ZERO,
            attended: 0,
            capacity: None,
            by_type: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueReport {
    pub events: Vec<EventTally>,
}

impl RevenueReport {
    /// Tickets sold keyed by event name. Same-named events on different days
    /// are summed.
    pub fn tickets_sold(&self) -> BTreeMap<String, u64> {
        let mut out = BTreeMap::new();
        for tally in &self.events {
            *out.entry(tally.event.name.clone()).or_insert(0) += tally.tickets_sold;
        }
        out
    }

    /// Revenue keyed by event name. Same-named events on different days are
    /// summed.
    pub fn revenue(&self) -> BTreeMap<String, Decimal> {
        let mut out = BTreeMap::new();
        for tally in &self.events {
            *out.entry(tally.event.name.clone()).or_insert(Decimal::ZERO) += tally.revenue;
        }
        out
    }

    pub fn total_revenue(&self) -> Decimal {
        self.events.iter().map(|t| t.revenue).sum()
    }

    pub fn total_tickets_sold(&self) -> u64 {
        self.events.iter().map(|t| t.tickets_sold).sum()
    }
}
