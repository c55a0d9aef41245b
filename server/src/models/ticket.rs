use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::payment::PaymentMetadata;
use super::price;

/// The identifier embedded in a ticket's scannable payload.
///
/// Instances coming from the outside world are produced by the scan code
/// codec, which checks the shape; records read back from the ledger are
/// trusted as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketCode(String);

impl TicketCode {
    pub(crate) fn from_normalized(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whitespace-insensitive comparison against a stored code.
    pub fn matches(&self, stored: &str) -> bool {
        self.0.trim() == stored.trim()
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who the ticket is issued to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holder {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub sequence_number: u32,
    pub code: TicketCode,
    #[serde(default)]
    pub holder_name: String,
    #[serde(default)]
    pub holder_email: String,
    #[serde(default)]
    pub ticket_type_name: String,
    /// Frozen at issuance; later price changes to the type do not apply.
    #[serde(default, deserialize_with = "price::lenient_or_zero")]
    pub price: Decimal,
    #[serde(default)]
    pub event_name: String,
    pub event_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentMetadata>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub validated: bool,
}

/// Reads a stored `validated` flag: a boolean, `"true"`/`"false"` text, or
/// absent for a ticket never redeemed. `None` means the value is unreadable.
pub fn validated_flag(raw: Option<&Value>) -> Option<bool> {
    match raw {
        None | Some(Value::Null) => Some(false),
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        Some(_) => None,
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    validated_flag(raw.as_ref()).ok_or_else(|| de::Error::custom("validated flag is not a boolean"))
}

/// The part of a ticket shown to the door operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketInfo {
    pub sequence_number: u32,
    pub holder_name: String,
    pub ticket_type_name: String,
    pub price: Decimal,
    pub event_name: String,
    pub event_date: NaiveDate,
}

impl From<&Ticket> for TicketInfo {
    fn from(ticket: &Ticket) -> Self {
        Self {
            sequence_number: ticket.sequence_number,
            holder_name: ticket.holder_name.clone(),
            ticket_type_name: ticket.ticket_type_name.clone(),
            price: ticket.price,
            event_name: ticket.event_name.clone(),
            event_date: ticket.event_date,
        }
    }
}
