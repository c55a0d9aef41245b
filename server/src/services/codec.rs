//! Scannable payloads.
//!
//! A ticket code is `{EVENT_TAG}-{SEQUENCE}`: eight upper-case hex digits
//! identifying the (venue, date, event) triple, then the six-digit sequence
//! number. The payload printed in the QR code is the code behind a fixed
//! version prefix, e.g. `NPT1:3F9A0C11-000042`.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{EventKey, Ticket, TicketCode, VenueId};
use crate::store::path::day_key;

pub const PAYLOAD_PREFIX: &str = "NPT1:";
const TAG_LEN: usize = 8;
const SEQUENCE_LEN: usize = 6;
pub const CODE_LEN: usize = TAG_LEN + 1 + SEQUENCE_LEN;
pub const PAYLOAD_LEN: usize = PAYLOAD_PREFIX.len() + CODE_LEN;
pub const MAX_SEQUENCE: u32 = 999_999;

const EVENT_TAG_NAMESPACE: Uuid = Uuid::from_u128(0x6e70_7431_7469_636b_6574_7461_6773_0001);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("payload does not carry the ticket prefix")]
    Prefix,
    #[error("payload has length {0}, expected {PAYLOAD_LEN}")]
    Length(usize),
    #[error("payload body is not a ticket code")]
    Shape,
}

/// Stable tag for an event partition.
pub fn event_tag(venue_id: &VenueId, key: &EventKey) -> String {
    let name = format!("{}/{}/{}", venue_id, day_key(key.date), key.name);
    let id = Uuid::new_v5(&EVENT_TAG_NAMESPACE, name.as_bytes());
    id.as_bytes()[..TAG_LEN / 2]
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect()
}

/// Derives the code for ticket `sequence_number` of an event. Returns `None`
/// outside `1..=MAX_SEQUENCE`.
pub fn ticket_code(venue_id: &VenueId, key: &EventKey, sequence_number: u32) -> Option<TicketCode> {
    if sequence_number == 0 || sequence_number > MAX_SEQUENCE {
        return None;
    }
    let code = format!("{}-{:06}", event_tag(venue_id, key), sequence_number);
    Some(TicketCode::from_normalized(code))
}

pub fn encode(ticket: &Ticket) -> String {
    encode_code(&ticket.code)
}

pub fn encode_code(code: &TicketCode) -> String {
    format!("{PAYLOAD_PREFIX}{}", code.as_str().trim())
}

/// Parses a camera-observed payload. Garbled or foreign input is an error
/// value, never a panic.
pub fn decode(payload: &str) -> Result<TicketCode, DecodeError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    let prefix_matches = trimmed
        .get(..PAYLOAD_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(PAYLOAD_PREFIX));
    if !prefix_matches {
        return Err(DecodeError::Prefix);
    }
    if trimmed.len() != PAYLOAD_LEN {
        return Err(DecodeError::Length(trimmed.len()));
    }

    let body = &trimmed[PAYLOAD_PREFIX.len()..];
    let bytes = body.as_bytes();
    let tag_ok = bytes[..TAG_LEN].iter().all(u8::is_ascii_hexdigit);
    let separator_ok = bytes[TAG_LEN] == b'-';
    let sequence_ok = body.get(TAG_LEN + 1..).is_some_and(|sequence| {
        sequence.bytes().all(|b| b.is_ascii_digit()) && sequence.parse::<u32>().is_ok_and(|n| n > 0)
    });

    if !(tag_ok && separator_ok && sequence_ok) {
        return Err(DecodeError::Shape);
    }

    Ok(TicketCode::from_normalized(body.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn launch() -> (VenueId, EventKey) {
        (
            VenueId::new("club-7"),
            EventKey::new(NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(), "Launch"),
        )
    }

    fn ticket_with(code: TicketCode) -> Ticket {
        Ticket {
            sequence_number: 1,
            code,
            holder_name: "Ana".to_string(),
            holder_email: "ana@example.com".to_string(),
            ticket_type_name: "General".to_string(),
            price: Decimal::new(15, 0),
            event_name: "Launch".to_string(),
            event_date: NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(),
            issued_at: Some(Utc::now()),
            payment: None,
            validated: false,
        }
    }

    #[test]
    fn test_code_shape() {
        let (venue, key) = launch();
        let code = ticket_code(&venue, &key, 42).unwrap();
        assert_eq!(code.as_str().len(), CODE_LEN);
        assert!(code.as_str().ends_with("-000042"));
        assert_eq!(encode_code(&code).len(), PAYLOAD_LEN);
    }

    #[test]
    fn test_codes_are_deterministic_and_partitioned() {
        let (venue, key) = launch();
        assert_eq!(ticket_code(&venue, &key, 1), ticket_code(&venue, &key, 1));

        let other_event = EventKey::new(key.date, "Afterparty");
        let other_day = EventKey::new(key.date.succ_opt().unwrap(), "Launch");
        assert_ne!(event_tag(&venue, &key), event_tag(&venue, &other_event));
        assert_ne!(event_tag(&venue, &key), event_tag(&venue, &other_day));
        assert_ne!(event_tag(&venue, &key), event_tag(&VenueId::new("club-8"), &key));
    }

    #[test]
    fn test_sequence_bounds() {
        let (venue, key) = launch();
        assert!(ticket_code(&venue, &key, 0).is_none());
        assert!(ticket_code(&venue, &key, MAX_SEQUENCE).is_some());
        assert!(ticket_code(&venue, &key, MAX_SEQUENCE + 1).is_none());
    }

    #[test]
    fn test_decode_normalizes_whitespace_and_case() {
        let (venue, key) = launch();
        let code = ticket_code(&venue, &key, 7).unwrap();
        let payload = format!("  {}\r\n", encode_code(&code).to_lowercase());
        assert_eq!(decode(&payload), Ok(code));
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        assert_eq!(decode("   "), Err(DecodeError::Empty));
        assert_eq!(decode("https://example.com/x"), Err(DecodeError::Prefix));
        assert_eq!(decode("NPT1:0A1B2C3D-00004"), Err(DecodeError::Length(19)));
        assert_eq!(decode("NPT1:0A1B2C3D-0000042"), Err(DecodeError::Length(21)));
        assert_eq!(decode("NPT1:0A1B2C3D_000042"), Err(DecodeError::Shape));
        assert_eq!(decode("NPT1:0A1B2XYZ-000042"), Err(DecodeError::Shape));
        assert_eq!(decode("NPT1:0A1B2C3D-00004A"), Err(DecodeError::Shape));
        assert_eq!(decode("NPT1:0A1B2C3D-000000"), Err(DecodeError::Shape));
        assert_eq!(decode("NPT1:0A1B2C3D-0000é"), Err(DecodeError::Shape));
        assert_eq!(decode("ñPT1:0A1B2C3D-000042"), Err(DecodeError::Prefix));
        assert_eq!(decode("NPT1:0A1B2C3Dé00000"), Err(DecodeError::Shape));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            venue in "[a-z0-9-]{1,16}",
            name in "\\PC{1,24}",
            days in 0u64..3650,
            sequence in 1u32..=MAX_SEQUENCE,
        ) {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(days);
            let venue = VenueId::new(venue);
            let key = EventKey::new(date, name);
            let code = ticket_code(&venue, &key, sequence).unwrap();
            let ticket = ticket_with(code.clone());
            prop_assert_eq!(decode(&encode(&ticket)), Ok(code));
        }

        #[test]
        fn prop_decode_never_panics(input in "\\PC{0,40}") {
            let _ = decode(&input);
        }
    }
}
