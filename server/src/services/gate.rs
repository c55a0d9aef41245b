use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::ticket::validated_flag;
use crate::models::{RedemptionOutcome, Ticket, TicketCode, TicketInfo, VenueId};
use crate::store::path::{self, TICKETS_FIELD, VALIDATED_FIELD};
use crate::store::{LedgerError, LedgerPath, LedgerStore};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(4);

/// Door-side validation of decoded ticket codes.
///
/// A ticket moves from issued to redeemed exactly once. The move is a
/// conditional write of the `validated` leaf against the value just read, so
/// when several scanners present the same code only one of them sees its
/// write applied; everyone else is told the ticket was already used.
#[derive(Clone)]
pub struct RedemptionGate {
    ledger: Arc<dyn LedgerStore>,
    lookup_timeout: Duration,
}

/// A ticket located in the day partition, with the raw `validated` value the
/// conditional write is checked against.
#[derive(Debug)]
struct Located {
    validated_path: LedgerPath,
    raw_validated: Option<Value>,
    validated: bool,
    ticket: Ticket,
}

impl RedemptionGate {
    pub fn new(ledger: Arc<dyn LedgerStore>, lookup_timeout: Duration) -> Self {
        Self {
            ledger,
            lookup_timeout,
        }
    }

    pub async fn redeem(&self, venue_id: &VenueId, today: NaiveDate, code: &TicketCode) -> RedemptionOutcome {
        let located = match self.locate(venue_id, today, code).await {
            Ok(found) => found,
            Err(first) => {
                warn!(venue_id = %venue_id, %code, error = %first, "Ticket lookup failed, retrying once");
                match self.locate(venue_id, today, code).await {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(venue_id = %venue_id, %code, error = %err, "LOOKUP_ERROR");
                        return RedemptionOutcome::LookupError;
                    }
                }
            }
        };

        let Some(located) = located else {
            info!(venue_id = %venue_id, %code, %today, "INVALID");
            return RedemptionOutcome::Invalid;
        };

        let ticket_info = TicketInfo::from(&located.ticket);
        if located.validated {
            info!(venue_id = %venue_id, %code, "ALREADY_USED");
            return RedemptionOutcome::AlreadyUsed(ticket_info);
        }

        // The write is not retried: it may have landed even when the reply
        // was lost.
        let flipped = self
            .bounded(self.ledger.compare_and_set(
                &located.validated_path,
                located.raw_validated.as_ref(),
                Value::Bool(true),
            ))
            .await;

        match flipped {
            Ok(true) => {
                info!(
                    venue_id = %venue_id,
                    %code,
                    sequence_number = ticket_info.sequence_number,
                    "ALLOW"
                );
                RedemptionOutcome::Allow(ticket_info)
            }
            Ok(false) => {
                info!(venue_id = %venue_id, %code, "ALREADY_USED (lost race to another scanner)");
                RedemptionOutcome::AlreadyUsed(ticket_info)
            }
            Err(err) => {
                warn!(venue_id = %venue_id, %code, error = %err, "LOOKUP_ERROR while marking ticket used");
                RedemptionOutcome::LookupError
            }
        }
    }

    /// Linear search of every event and ticket filed under `today`.
    async fn locate(
        &self,
        venue_id: &VenueId,
        today: NaiveDate,
        code: &TicketCode,
    ) -> Result<Option<Located>, LedgerError> {
        let day_path = path::events_on(venue_id, today);
        let Some(day) = self.bounded(self.ledger.get(&day_path)).await? else {
            debug!(path = %day_path, "No events filed for today");
            return Ok(None);
        };
        let Value::Object(events) = day else {
            return Err(LedgerError::malformed(&day_path, "day partition is not an object"));
        };

        for (event_name, event) in &events {
            let Some(tickets) = event.get(TICKETS_FIELD).and_then(Value::as_object) else {
                continue;
            };
            let ticket_path = day_path.child(event_name.as_str()).child(TICKETS_FIELD);
            let partition = Partition {
                date: today,
                event_name: event_name.as_str(),
            };
            if let Some(found) = find_in_event(&ticket_path, &partition, tickets, code)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        tokio::time::timeout(self.lookup_timeout, call)
            .await
            .map_err(|_| LedgerError::Unavailable(format!("no reply within {:?}", self.lookup_timeout)))?
    }
}

/// Where a ticket record was found. Records written by older issuers may
/// omit fields the partition already implies.
struct Partition<'a> {
    date: NaiveDate,
    event_name: &'a str,
}

fn find_in_event(
    tickets_path: &LedgerPath,
    partition: &Partition<'_>,
    tickets: &Map<String, Value>,
    code: &TicketCode,
) -> Result<Option<Located>, LedgerError> {
    for (sequence, record) in tickets {
        let stored = record.get("code").and_then(Value::as_str);
        if !stored.is_some_and(|stored| code.matches(stored)) {
            continue;
        }

        let record_path = tickets_path.child(sequence.as_str());
        let raw_validated = record.get(VALIDATED_FIELD).cloned();
        let validated = validated_flag(raw_validated.as_ref())
            .ok_or_else(|| LedgerError::malformed(&record_path, "validated flag is not a boolean"))?;

        let mut record = record.clone();
        if let Value::Object(fields) = &mut record {
            fields
                .entry("event_date")
                .or_insert_with(|| Value::String(partition.date.to_string()));
            fields
                .entry("event_name")
                .or_insert_with(|| Value::String(partition.event_name.to_string()));
            if let Ok(number) = sequence.parse::<u32>() {
                fields.entry("sequence_number").or_insert_with(|| Value::from(number));
            }
        }
        let ticket: Ticket = serde_json::from_value(record)
            .map_err(|e| LedgerError::malformed(&record_path, e.to_string()))?;

        return Ok(Some(Located {
            validated_path: record_path.child(VALIDATED_FIELD),
            raw_validated,
            validated,
            ticket,
        }));
    }
    Ok(None)
}
