use chrono::NaiveDate;
use std::fmt;

use crate::models::{EventKey, VenueId};

/// Format used for calendar-day partition keys in the ledger.
pub const DAY_KEY_FORMAT: &str = "%d-%m-%Y";

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), DAY_KEY_FORMAT).ok()
}

/// A slash-separated location in the ledger tree.
///
/// Segments are kept decoded; `/` and `%` inside a segment are escaped only
/// when the path is rendered as a storage key, so human-entered event names
/// can be used verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LedgerPath {
    segments: Vec<String>,
}

impl LedgerPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Storage key for this path.
    pub fn key(&self) -> String {
        self.segments
            .iter()
            .map(|s| escape_segment(s))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Key prefix shared by every descendant of this path.
    pub fn descendant_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}/", self.key())
        }
    }
}

impl fmt::Display for LedgerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.key())
    }
}

pub fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if tail.starts_with("%25") {
            out.push('%');
            rest = &tail[3..];
        } else if tail.starts_with("%2F") {
            out.push('/');
            rest = &tail[3..];
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

pub fn venue(venue_id: &VenueId) -> LedgerPath {
    LedgerPath::root().child("venues").child(venue_id.as_str())
}

pub fn venue_name(venue_id: &VenueId) -> LedgerPath {
    venue(venue_id).child("name")
}

/// Every event filed under one calendar day for a venue.
pub fn events_on(venue_id: &VenueId, date: NaiveDate) -> LedgerPath {
    venue(venue_id).child("events").child(day_key(date))
}

/// Paths inside a single (venue, date, event) partition.
#[derive(Debug, Clone)]
pub struct EventPath {
    base: LedgerPath,
}

impl EventPath {
    pub fn new(venue_id: &VenueId, key: &EventKey) -> Self {
        Self {
            base: events_on(venue_id, key.date).child(key.name.as_str()),
        }
    }

    pub fn base(&self) -> &LedgerPath {
        &self.base
    }

    pub fn info(&self) -> LedgerPath {
        self.base.child("info")
    }

    pub fn ticket_types(&self) -> LedgerPath {
        self.base.child("ticket_types")
    }

    pub fn ticket_type(&self, name: &str) -> LedgerPath {
        self.ticket_types().child(name)
    }

    pub fn counter(&self) -> LedgerPath {
        self.base.child(COUNTER_FIELD)
    }

    pub fn tickets(&self) -> LedgerPath {
        self.base.child(TICKETS_FIELD)
    }

    pub fn ticket(&self, sequence_number: u32) -> LedgerPath {
        self.tickets().child(sequence_number.to_string())
    }

    pub fn ticket_validated(&self, sequence_number: u32) -> LedgerPath {
        self.ticket(sequence_number).child(VALIDATED_FIELD)
    }
}

pub const COUNTER_FIELD: &str = "last_ticket_number";
pub const TICKETS_FIELD: &str = "tickets";
pub const VALIDATED_FIELD: &str = "validated";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_key_uses_day_first_format() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 20).unwrap();
        assert_eq!(day_key(date), "20-07-2025");
        assert_eq!(parse_day_key(" 20-07-2025 "), Some(date));
        assert_eq!(parse_day_key("2025-07-20"), None);
    }

    #[test]
    fn test_segments_with_separators_are_escaped() {
        let path = LedgerPath::root().child("events").child("Rock/Pop 100%");
        assert_eq!(path.key(), "events/Rock%2FPop 100%25");
        assert_eq!(unescape_segment("Rock%2FPop 100%25"), "Rock/Pop 100%");
    }

    #[test]
    fn test_unescape_leaves_stray_percent() {
        assert_eq!(unescape_segment("50%off"), "50%off");
        assert_eq!(unescape_segment("%252F"), "%2F");
    }

    #[test]
    fn test_event_paths_share_partition() {
        let venue_id = VenueId::new("club-7");
        let key = EventKey::new(NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(), "Launch");
        let paths = EventPath::new(&venue_id, &key);

        assert_eq!(
            paths.ticket_validated(3).key(),
            "venues/club-7/events/20-07-2025/Launch/tickets/3/validated"
        );
        assert!(paths
            .counter()
            .key()
            .starts_with(&events_on(&venue_id, key.date).descendant_prefix()));
        assert_eq!(LedgerPath::root().descendant_prefix(), "");
    }
}
