use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{price, EventKey, Holder, PaymentMetadata, Ticket, VenueId};
use crate::services::codec::{self, MAX_SEQUENCE};
use crate::store::{EventPath, LedgerError, LedgerPath, LedgerStore};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("Invalid ticket request: {0}")]
    InvalidRequest(String),

    #[error("Ticket type '{ticket_type}' is not on sale for {event}")]
    UnknownTicketType { event: EventKey, ticket_type: String },

    #[error("Event {0} has used every ticket number")]
    Exhausted(EventKey),

    #[error("Could not claim a ticket number for {event} after {attempts} attempts")]
    Conflict { event: EventKey, attempts: u32 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<serde_json::Error> for AllocationError {
    fn from(err: serde_json::Error) -> Self {
        AllocationError::Ledger(LedgerError::Encoding(err))
    }
}

/// What the issuing flow asks for.
#[derive(Debug, Clone)]
pub struct TicketRequest {
    pub ticket_type: String,
    pub holder: Holder,
    pub payment: Option<PaymentMetadata>,
}

/// Issues sequentially numbered tickets.
///
/// Each event keeps its high-water mark in `last_ticket_number`. A number is
/// claimed by creating `tickets/{n}` only if nothing is there yet, and only
/// then is the counter moved forward, so a ticket always exists before any
/// later allocation relies on the bumped counter. Losing the claim means
/// another issuer got there first (or an earlier issuer died before bumping
/// the counter); the counter is advanced past the taken number and the
/// allocation starts over.
#[derive(Clone)]
pub struct TicketAllocator {
    ledger: Arc<dyn LedgerStore>,
    max_attempts: u32,
}

impl TicketAllocator {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self::with_max_attempts(ledger, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(ledger: Arc<dyn LedgerStore>, max_attempts: u32) -> Self {
        Self {
            ledger,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn allocate(
        &self,
        venue_id: &VenueId,
        key: &EventKey,
        request: TicketRequest,
    ) -> Result<Ticket, AllocationError> {
        validate_request(venue_id, key, &request)?;
        let paths = EventPath::new(venue_id, key);
        let price = self.frozen_price(&paths, key, &request.ticket_type).await?;

        for attempt in 1..=self.max_attempts {
            let counter_raw = self.ledger.get(&paths.counter()).await?;
            let last = read_counter(&paths.counter(), counter_raw.as_ref())?;
            let next = last
                .checked_add(1)
                .filter(|n| *n <= MAX_SEQUENCE)
                .ok_or_else(|| AllocationError::Exhausted(key.clone()))?;
            let code = codec::ticket_code(venue_id, key, next)
                .ok_or_else(|| AllocationError::Exhausted(key.clone()))?;

            let ticket = Ticket {
                sequence_number: next,
                code,
                holder_name: request.holder.name.trim().to_string(),
                holder_email: request.holder.email.trim().to_string(),
                ticket_type_name: request.ticket_type.trim().to_string(),
                price,
                event_name: key.name.clone(),
                event_date: key.date,
                issued_at: Some(Utc::now()),
                payment: request.payment.clone(),
                validated: false,
            };

            let claimed = self
                .ledger
                .compare_and_set(&paths.ticket(next), None, serde_json::to_value(&ticket)?)
                .await?;

            if !claimed {
                warn!(
                    venue_id = %venue_id,
                    event = %key,
                    sequence_number = next,
                    attempt,
                    "ALLOCATION_CONFLICT: ticket number already taken, retrying"
                );
                self.advance_counter(&paths, counter_raw.as_ref(), next).await?;
                continue;
            }

            self.advance_counter(&paths, counter_raw.as_ref(), next).await?;
            info!(
                venue_id = %venue_id,
                event = %key,
                sequence_number = next,
                ticket_type = %ticket.ticket_type_name,
                "Ticket issued"
            );
            return Ok(ticket);
        }

        Err(AllocationError::Conflict {
            event: key.clone(),
            attempts: self.max_attempts,
        })
    }

    async fn frozen_price(
        &self,
        paths: &EventPath,
        key: &EventKey,
        ticket_type: &str,
    ) -> Result<Decimal, AllocationError> {
        let type_path = paths.ticket_type(ticket_type.trim());
        let Some(record) = self.ledger.get(&type_path).await? else {
            return Err(AllocationError::UnknownTicketType {
                event: key.clone(),
                ticket_type: ticket_type.to_string(),
            });
        };

        match record.get("price") {
            None | Some(Value::Null) => {
                debug!(path = %type_path, "Ticket type has no price, issuing at zero");
                Ok(Decimal::ZERO)
            }
            Some(raw) => Ok(price::parse_price(raw).unwrap_or_else(|| {
                warn!(path = %type_path, "Ticket type has no readable price, issuing at zero");
                Decimal::ZERO
            })),
        }
    }

    /// Moves the counter from the value read to `next`. A failed swap means
    /// another issuer already moved it, which is fine either way.
    async fn advance_counter(
        &self,
        paths: &EventPath,
        read: Option<&Value>,
        next: u32,
    ) -> Result<(), AllocationError> {
        let moved = self
            .ledger
            .compare_and_set(&paths.counter(), read, Value::from(next))
            .await?;
        if !moved {
            debug!(counter = %paths.counter(), next, "Counter already moved by another issuer");
        }
        Ok(())
    }
}

/// Reads the high-water mark, accepting a number or numeric text.
pub fn read_counter(path: &LedgerPath, raw: Option<&Value>) -> Result<u32, LedgerError> {
    let parsed = match raw {
        None => Some(0),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        Some(_) => None,
    };
    parsed.ok_or_else(|| LedgerError::malformed(path, "ticket counter is not a number"))
}

fn validate_request(
    venue_id: &VenueId,
    key: &EventKey,
    request: &TicketRequest,
) -> Result<(), AllocationError> {
    if venue_id.is_blank() {
        return Err(AllocationError::InvalidRequest("venue id is empty".to_string()));
    }
    if key.name.trim().is_empty() {
        return Err(AllocationError::InvalidRequest("event name is empty".to_string()));
    }
    if request.ticket_type.trim().is_empty() {
        return Err(AllocationError::InvalidRequest("ticket type is empty".to_string()));
    }
    if request.holder.name.trim().is_empty() {
        return Err(AllocationError::InvalidRequest("holder name is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventListing, TicketType};
    use crate::services::catalog::EventCatalog;
    use crate::store::InMemoryLedger;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};

    fn launch_key() -> EventKey {
        EventKey::new(NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(), "Launch")
    }

    async fn setup() -> (Arc<InMemoryLedger>, TicketAllocator, VenueId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let venue = VenueId::new("club-7");
        let mut ticket_types = BTreeMap::new();
        ticket_types.insert(
            "General".to_string(),
            TicketType {
                price: Some(Decimal::new(15, 0)),
                capacity: Some(100),
            },
        );
        EventCatalog::new(ledger.clone())
            .publish_event(
                &venue,
                &EventListing {
                    key: launch_key(),
                    info: Default::default(),
                    ticket_types,
                },
            )
            .await
            .unwrap();
        let allocator = TicketAllocator::new(ledger.clone());
        (ledger, allocator, venue)
    }

    fn request(holder: &str) -> TicketRequest {
        TicketRequest {
            ticket_type: "General".to_string(),
            holder: Holder {
                name: holder.to_string(),
                email: format!("{}@example.com", holder.to_lowercase()),
            },
            payment: None,
        }
    }

    #[tokio::test]
    async fn test_sequential_allocation_is_dense_from_one() {
        let (ledger, allocator, venue) = setup().await;

        let mut numbers = Vec::new();
        for i in 0..5 {
            let ticket = allocator
                .allocate(&venue, &launch_key(), request(&format!("Guest{i}")))
                .await
                .unwrap();
            numbers.push(ticket.sequence_number);
        }

        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        let paths = EventPath::new(&venue, &launch_key());
        assert_eq!(ledger.get(&paths.counter()).await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_ticket_is_persisted_with_frozen_price() {
        let (ledger, allocator, venue) = setup().await;
        let ticket = allocator
            .allocate(&venue, &launch_key(), request("Ana"))
            .await
            .unwrap();

        let paths = EventPath::new(&venue, &launch_key());
        ledger
            .set(&paths.ticket_type("General").child("price"), json!("25"))
            .await
            .unwrap();

        let stored: Ticket =
            serde_json::from_value(ledger.get(&paths.ticket(1)).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored, ticket);
        assert_eq!(stored.price, Decimal::new(15, 0));
        assert!(!stored.validated);
    }

    #[tokio::test]
    async fn test_text_counter_is_accepted() {
        let (ledger, allocator, venue) = setup().await;
        let paths = EventPath::new(&venue, &launch_key());
        ledger.set(&paths.counter(), json!("41")).await.unwrap();

        let ticket = allocator
            .allocate(&venue, &launch_key(), request("Ana"))
            .await
            .unwrap();
        assert_eq!(ticket.sequence_number, 42);
        assert_eq!(ledger.get(&paths.counter()).await.unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn test_orphan_ticket_is_skipped() {
        let (ledger, allocator, venue) = setup().await;
        let paths = EventPath::new(&venue, &launch_key());
        // Ticket 1 written by an issuer that never bumped the counter.
        ledger
            .set(&paths.ticket(1), json!({ "code": "orphan", "sequence_number": 1 }))
            .await
            .unwrap();

        let ticket = allocator
            .allocate(&venue, &launch_key(), request("Ana"))
            .await
            .unwrap();
        assert_eq!(ticket.sequence_number, 2);
        assert_eq!(ledger.get(&paths.counter()).await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_concurrent_allocations_get_unique_numbers() {
        let (ledger, _, venue) = setup().await;
        let allocator = TicketAllocator::with_max_attempts(ledger.clone(), 64);

        let mut handles = Vec::new();
        for i in 0..20 {
            let allocator = allocator.clone();
            let venue = venue.clone();
            handles.push(tokio::spawn(async move {
                allocator
                    .allocate(&venue, &launch_key(), request(&format!("Guest{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut numbers = HashSet::new();
        let mut codes = HashSet::new();
        for handle in handles {
            let ticket = handle.await.unwrap();
            numbers.insert(ticket.sequence_number);
            codes.insert(ticket.code);
        }
        assert_eq!(numbers.len(), 20);
        assert_eq!(codes.len(), 20);
        assert_eq!(numbers, (1..=20).collect::<HashSet<u32>>());
    }

    #[tokio::test]
    async fn test_unknown_type_and_exhaustion() {
        let (ledger, allocator, venue) = setup().await;
        let mut bad = request("Ana");
        bad.ticket_type = "Backstage".to_string();
        assert!(matches!(
            allocator.allocate(&venue, &launch_key(), bad).await,
            Err(AllocationError::UnknownTicketType { .. })
        ));

        let paths = EventPath::new(&venue, &launch_key());
        ledger.set(&paths.counter(), json!(MAX_SEQUENCE)).await.unwrap();
        assert!(matches!(
            allocator.allocate(&venue, &launch_key(), request("Ana")).await,
            Err(AllocationError::Exhausted(_))
        ));
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_and_nothing_is_issued() {
        let (ledger, allocator, venue) = setup().await;
        ledger.fail_writes(true);
        assert!(matches!(
            allocator.allocate(&venue, &launch_key(), request("Ana")).await,
            Err(AllocationError::Ledger(_))
        ));
        ledger.fail_writes(false);

        let ticket = allocator
            .allocate(&venue, &launch_key(), request("Ana"))
            .await
            .unwrap();
        assert_eq!(ticket.sequence_number, 1);
    }

    #[tokio::test]
    async fn test_tier_without_price_is_issued_at_zero() {
        let ledger = Arc::new(InMemoryLedger::new());
        let venue = VenueId::new("club-7");
        let mut ticket_types = BTreeMap::new();
        ticket_types.insert("Guestlist".to_string(), TicketType::default());
        EventCatalog::new(ledger.clone())
            .publish_event(
                &venue,
                &EventListing {
                    key: launch_key(),
                    info: Default::default(),
                    ticket_types,
                },
            )
            .await
            .unwrap();

        let mut guest = request("Ana");
        guest.ticket_type = "Guestlist".to_string();
        let ticket = TicketAllocator::new(ledger)
            .allocate(&venue, &launch_key(), guest)
            .await
            .unwrap();
        assert_eq!(ticket.sequence_number, 1);
        assert_eq!(ticket.price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_padded_type_name_can_be_sold() {
        let ledger = Arc::new(InMemoryLedger::new());
        let venue = VenueId::new("club-7");
        let mut ticket_types = BTreeMap::new();
        ticket_types.insert(
            " VIP ".to_string(),
            TicketType {
                price: Some(Decimal::new(4050, 2)),
                capacity: Some(10),
            },
        );
        EventCatalog::new(ledger.clone())
            .publish_event(
                &venue,
                &EventListing {
                    key: launch_key(),
                    info: Default::default(),
                    ticket_types,
                },
            )
            .await
            .unwrap();

        let allocator = TicketAllocator::new(ledger);
        for name in [" VIP ", "VIP"] {
            let mut vip = request("Ana");
            vip.ticket_type = name.to_string();
            let ticket = allocator.allocate(&venue, &launch_key(), vip).await.unwrap();
            assert_eq!(ticket.ticket_type_name, "VIP");
            assert_eq!(ticket.price, Decimal::new(4050, 2));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_sequential_allocations_are_dense(count in 1u32..30) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (numbers, counter) = runtime.block_on(async {
                let (ledger, allocator, venue) = setup().await;
                let mut numbers = Vec::new();
                for i in 0..count {
                    let ticket = allocator
                        .allocate(&venue, &launch_key(), request(&format!("Guest{i}")))
                        .await
                        .unwrap();
                    numbers.push(ticket.sequence_number);
                }
                let paths = EventPath::new(&venue, &launch_key());
                (numbers, ledger.get(&paths.counter()).await.unwrap())
            });

            prop_assert_eq!(numbers, (1..=count).collect::<Vec<u32>>());
            prop_assert_eq!(counter, Some(json!(count)));
        }
    }

    #[test]
    fn test_read_counter_rejects_garbage() {
        let path = LedgerPath::root().child("c");
        assert_eq!(read_counter(&path, None).unwrap(), 0);
        assert_eq!(read_counter(&path, Some(&json!(7))).unwrap(), 7);
        assert_eq!(read_counter(&path, Some(&json!(" 8 "))).unwrap(), 8);
        assert!(read_counter(&path, Some(&json!(-1))).is_err());
        assert!(read_counter(&path, Some(&json!("many"))).is_err());
    }
}
