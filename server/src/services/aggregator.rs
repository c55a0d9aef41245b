use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::event::total_capacity;
use crate::models::ticket::validated_flag;
use crate::models::{price, EventKey, EventTally, RevenueReport, TicketType, VenueId};
use crate::services::allocator::read_counter;
use crate::services::codec::MAX_SEQUENCE;
use crate::store::path::{COUNTER_FIELD, TICKETS_FIELD, VALIDATED_FIELD};
use crate::store::{EventPath, LedgerError, LedgerStore};

/// Read-only sales and attendance pass over the ledger.
///
/// A bad ticket record costs its own contribution, never the report: an
/// unreadable price counts as zero and an unreadable counter falls back to
/// the number of ticket records present. A counter past the last issuable
/// number is treated as unreadable.
#[derive(Clone)]
pub struct RevenueAggregator {
    ledger: Arc<dyn LedgerStore>,
}

impl RevenueAggregator {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn aggregate(
        &self,
        venue_id: &VenueId,
        events: &[EventKey],
    ) -> Result<RevenueReport, LedgerError> {
        let mut report = RevenueReport::default();
        for key in events {
            let paths = EventPath::new(venue_id, key);
            let tally = match self.ledger.get(paths.base()).await? {
                Some(event) => tally_event(&paths, key, &event),
                None => {
                    debug!(venue_id = %venue_id, event = %key, "No ledger data for event");
                    EventTally::empty(key.clone())
                }
            };
            report.events.push(tally);
        }
        Ok(report)
    }
}

fn tally_event(paths: &EventPath, key: &EventKey, event: &Value) -> EventTally {
    let mut tally = EventTally::empty(key.clone());
    let tickets = event.get(TICKETS_FIELD).and_then(Value::as_object);
    let record_count = tickets.map_or(0, |t| t.len() as u64);

    tally.tickets_sold = match read_counter(&paths.counter(), event.get(COUNTER_FIELD)) {
        Ok(sold) if sold <= MAX_SEQUENCE => u64::from(sold),
        Ok(sold) => {
            warn!(event = %key, counter = sold, "Ticket counter out of range, counting ticket records instead");
            record_count
        }
        Err(err) => {
            warn!(event = %key, error = %err, "Unreadable ticket counter, counting ticket records instead");
            record_count
        }
    };

    tally.capacity = event
        .get("ticket_types")
        .and_then(|types| serde_json::from_value::<BTreeMap<String, TicketType>>(types.clone()).ok())
        .and_then(|types| total_capacity(types.values()));

    let Some(tickets) = tickets else {
        return tally;
    };

    let last = tally.tickets_sold.min(u64::from(MAX_SEQUENCE));
    let issued = tickets.iter().filter_map(|(number, record)| {
        let sequence = number.parse::<u32>().ok()?;
        (sequence >= 1 && u64::from(sequence) <= last).then_some((sequence, record))
    });

    for (sequence, record) in issued {
        let price = match record.get("price").and_then(price::parse_price) {
            Some(price) => price,
            None => {
                warn!(
                    event = %key,
                    sequence_number = sequence,
                    "Ticket price unreadable, counting it as zero"
                );
                Decimal::ZERO
            }
        };
        let ticket_type = record
            .get("ticket_type_name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let by_type = tally.by_type.entry(ticket_type).or_default();
        by_type.tickets += 1;
        match (tally.revenue.checked_add(price), by_type.revenue.checked_add(price)) {
            (Some(total), Some(per_type)) => {
                tally.revenue = total;
                by_type.revenue = per_type;
            }
            _ => warn!(
                event = %key,
                sequence_number = sequence,
                "Revenue overflows, leaving this ticket's price out"
            ),
        }

        if validated_flag(record.get(VALIDATED_FIELD)) == Some(true) {
            tally.attended += 1;
        }
    }
    tally
}
