use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::price;

/// Identifies an event within a venue. Two events may share a name as long
/// as they fall on different days.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub date: NaiveDate,
    pub name: String,
}

impl EventKey {
    pub fn new(date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into().trim().to_string(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.date)
    }
}

/// A price/capacity tier within an event, e.g. "General" or "VIP".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    #[serde(
        default,
        deserialize_with = "price::lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    /// Advisory only; nothing refuses a sale or an entry over capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Descriptive fields stored under an event's `info` node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListing {
    pub key: EventKey,
    #[serde(default)]
    pub info: EventInfo,
    #[serde(default)]
    pub ticket_types: BTreeMap<String, TicketType>,
}

impl EventListing {
    pub fn total_capacity(&self) -> Option<u32> {
        total_capacity(self.ticket_types.values())
    }
}

/// Sum of the advisory capacities, or `None` if any type leaves it open.
pub fn total_capacity<'a>(types: impl IntoIterator<Item = &'a TicketType>) -> Option<u32> {
    types
        .into_iter()
        .map(|t| t.capacity)
        .try_fold(0u32, |acc, cap| cap.map(|c| acc.saturating_add(c)))
}
