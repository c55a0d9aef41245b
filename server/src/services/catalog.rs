use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{EventInfo, EventKey, EventListing, TicketType, Venue, VenueId};
use crate::store::path::{self, EventPath};
use crate::store::{LedgerError, LedgerStore};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Catalog encoding error")]
    Encoding(#[from] serde_json::Error),
}

/// Venues and the dated events they publish.
///
/// Publishing writes the event's `info` and `ticket_types` nodes only. The
/// ticket collection and its counter belong to the allocator and survive
/// re-publishing.
#[derive(Clone)]
pub struct EventCatalog {
    ledger: Arc<dyn LedgerStore>,
}

impl EventCatalog {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn register_venue(&self, venue: &Venue) -> Result<(), CatalogError> {
        if venue.id.is_blank() {
            return Err(CatalogError::InvalidListing("venue id is empty".to_string()));
        }
        self.ledger
            .set(&path::venue_name(&venue.id), Value::String(venue.name.trim().to_string()))
            .await?;
        info!(venue_id = %venue.id, "Venue registered");
        Ok(())
    }

    pub async fn publish_event(
        &self,
        venue_id: &VenueId,
        listing: &EventListing,
    ) -> Result<(), CatalogError> {
        validate_listing(venue_id, listing)?;
        let ticket_types = stored_ticket_types(&listing.ticket_types)?;

        let paths = EventPath::new(venue_id, &listing.key);
        let info = EventInfo {
            published_at: Some(Utc::now()),
            ..listing.info.clone()
        };
        self.ledger.set(&paths.info(), serde_json::to_value(&info)?).await?;
        self.ledger.set(&paths.ticket_types(), ticket_types).await?;

        info!(
            venue_id = %venue_id,
            event = %listing.key,
            ticket_types = listing.ticket_types.len(),
            "Event published"
        );
        Ok(())
    }

    pub async fn list_events(
        &self,
        venue_id: &VenueId,
        date: NaiveDate,
    ) -> Result<Vec<String>, CatalogError> {
        let names = self.ledger.children(&path::events_on(venue_id, date)).await?;
        debug!(venue_id = %venue_id, %date, count = names.len(), "Listed events");
        Ok(names)
    }

    pub async fn event(
        &self,
        venue_id: &VenueId,
        key: &EventKey,
    ) -> Result<Option<EventListing>, CatalogError> {
        let paths = EventPath::new(venue_id, key);
        let Some(info) = self.ledger.get(&paths.info()).await? else {
            return Ok(None);
        };
        let info: EventInfo = serde_json::from_value(info)?;

        let ticket_types: BTreeMap<String, TicketType> =
            match self.ledger.get(&paths.ticket_types()).await? {
                Some(types) => serde_json::from_value(types)?,
                None => BTreeMap::new(),
            };

        Ok(Some(EventListing {
            key: key.clone(),
            info,
            ticket_types,
        }))
    }
}

/// Ticket types keyed by trimmed name, each carrying its `name` so a type
/// with neither price nor capacity still leaves a record behind.
fn stored_ticket_types(types: &BTreeMap<String, TicketType>) -> Result<Value, CatalogError> {
    let mut stored = Map::new();
    for (name, ticket_type) in types {
        let name = name.trim();
        let mut record = match serde_json::to_value(ticket_type)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        record.insert("name".to_string(), Value::String(name.to_string()));
        if stored.insert(name.to_string(), Value::Object(record)).is_some() {
            return Err(CatalogError::InvalidListing(format!(
                "ticket type '{name}' is listed twice"
            )));
        }
    }
    Ok(Value::Object(stored))
}

fn validate_listing(venue_id: &VenueId, listing: &EventListing) -> Result<(), CatalogError> {
    if venue_id.is_blank() {
        return Err(CatalogError::InvalidListing("venue id is empty".to_string()));
    }
    if listing.key.name.trim().is_empty() {
        return Err(CatalogError::InvalidListing("event name is empty".to_string()));
    }
    for (name, ticket_type) in &listing.ticket_types {
        if name.trim().is_empty() {
            return Err(CatalogError::InvalidListing("ticket type name is empty".to_string()));
        }
        if ticket_type.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(CatalogError::InvalidListing(format!(
                "ticket type '{name}' has a negative price"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedger;

    fn listing(name: &str) -> EventListing {
        let mut ticket_types = BTreeMap::new();
        ticket_types.insert(
            "General".to_string(),
            TicketType {
                price: Some(Decimal::new(15, 0)),
                capacity: Some(200),
            },
        );
        ticket_types.insert(
            "VIP".to_string(),
            TicketType {
                price: Some(Decimal::new(4000, 2)),
                capacity: Some(20),
            },
        );
        EventListing {
            key: EventKey::new(NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(), name),
            info: EventInfo {
                genre: Some("House".to_string()),
                open_time: Some("22:00".to_string()),
                ..EventInfo::default()
            },
            ticket_types,
        }
    }

    #[tokio::test]
    async fn test_publish_and_read_back() {
        let catalog = EventCatalog::new(Arc::new(InMemoryLedger::new()));
        let venue = VenueId::new("club-7");
        let launch = listing("Launch");

        catalog.publish_event(&venue, &launch).await.unwrap();
        catalog.publish_event(&venue, &listing("Rock/Pop Night")).await.unwrap();

        let stored = catalog.event(&venue, &launch.key).await.unwrap().unwrap();
        assert_eq!(stored.ticket_types, launch.ticket_types);
        assert_eq!(stored.info.genre.as_deref(), Some("House"));
        assert!(stored.info.published_at.is_some());
        assert_eq!(stored.total_capacity(), Some(220));

        let names = catalog.list_events(&venue, launch.key.date).await.unwrap();
        assert_eq!(names, vec!["Launch".to_string(), "Rock/Pop Night".to_string()]);
    }

    #[tokio::test]
    async fn test_republishing_keeps_tickets() {
        let ledger = Arc::new(InMemoryLedger::new());
        let catalog = EventCatalog::new(ledger.clone());
        let venue = VenueId::new("club-7");
        let launch = listing("Launch");
        let paths = EventPath::new(&venue, &launch.key);

        catalog.publish_event(&venue, &launch).await.unwrap();
        ledger.set(&paths.counter(), serde_json::json!(3)).await.unwrap();
        catalog.publish_event(&venue, &launch).await.unwrap();

        assert_eq!(ledger.get(&paths.counter()).await.unwrap(), Some(serde_json::json!(3)));
    }

    #[tokio::test]
    async fn test_rejects_bad_listings() {
        let catalog = EventCatalog::new(Arc::new(InMemoryLedger::new()));
        let venue = VenueId::new("club-7");

        let mut negative = listing("Launch");
        negative.ticket_types.insert(
            "Refund".to_string(),
            TicketType {
                price: Some(Decimal::new(-5, 0)),
                capacity: None,
            },
        );
        assert!(matches!(
            catalog.publish_event(&venue, &negative).await,
            Err(CatalogError::InvalidListing(_))
        ));
        assert!(matches!(
            catalog.publish_event(&venue, &listing("   ")).await,
            Err(CatalogError::InvalidListing(_))
        ));
        assert!(matches!(
            catalog.publish_event(&VenueId::new(" "), &listing("Launch")).await,
            Err(CatalogError::InvalidListing(_))
        ));
    }

    #[tokio::test]
    async fn test_type_without_price_or_capacity_is_kept() {
        let catalog = EventCatalog::new(Arc::new(InMemoryLedger::new()));
        let venue = VenueId::new("club-7");
        let mut launch = listing("Launch");
        launch.ticket_types.insert("Guestlist".to_string(), TicketType::default());

        catalog.publish_event(&venue, &launch).await.unwrap();
        let stored = catalog.event(&venue, &launch.key).await.unwrap().unwrap();
        assert_eq!(stored.ticket_types.get("Guestlist"), Some(&TicketType::default()));
        assert_eq!(stored.total_capacity(), None);
    }

    #[tokio::test]
    async fn test_padded_type_names_are_trimmed() {
        let catalog = EventCatalog::new(Arc::new(InMemoryLedger::new()));
        let venue = VenueId::new("club-7");
        let mut launch = listing("Launch");
        let vip = launch.ticket_types.remove("VIP").unwrap();
        launch.ticket_types.insert(" VIP ".to_string(), vip.clone());

        catalog.publish_event(&venue, &launch).await.unwrap();
        let stored = catalog.event(&venue, &launch.key).await.unwrap().unwrap();
        assert_eq!(stored.ticket_types.get("VIP"), Some(&vip));
        assert!(!stored.ticket_types.contains_key(" VIP "));

        launch.ticket_types.insert("VIP".to_string(), vip);
        assert!(matches!(
            catalog.publish_event(&venue, &launch).await,
            Err(CatalogError::InvalidListing(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_event_is_none() {
        let catalog = EventCatalog::new(Arc::new(InMemoryLedger::new()));
        let key = EventKey::new(NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(), "Nope");
        assert!(catalog.event(&VenueId::new("club-7"), &key).await.unwrap().is_none());
    }
}
