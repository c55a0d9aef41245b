use serde::Serialize;

use super::ticket::TicketInfo;

/// Result of presenting a code at the door.
///
/// `Invalid` and `AlreadyUsed` are ordinary outcomes. `LookupError` means the
/// ledger could not be consulted and the guest must not be turned away on
/// its account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "ticket", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionOutcome {
    Allow(TicketInfo),
    AlreadyUsed(TicketInfo),
    Invalid,
    LookupError,
}

impl RedemptionOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RedemptionOutcome::Allow(_))
    }

    pub fn ticket(&self) -> Option<&TicketInfo> {
        match self {
            RedemptionOutcome::Allow(info) | RedemptionOutcome::AlreadyUsed(info) => Some(info),
            RedemptionOutcome::Invalid | RedemptionOutcome::LookupError => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RedemptionOutcome::Allow(_) => "ALLOW",
            RedemptionOutcome::AlreadyUsed(_) => "ALREADY_USED",
            RedemptionOutcome::Invalid => "INVALID",
            RedemptionOutcome::LookupError => "LOOKUP_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RedemptionOutcome::Allow(_) => "Ticket valid, let them in",
            RedemptionOutcome::AlreadyUsed(_) => "Ticket already used",
            RedemptionOutcome::Invalid => "Not a valid ticket for today",
            RedemptionOutcome::LookupError => "Cannot verify ticket, try again",
        }
    }
}
