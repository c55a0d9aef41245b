use tracing::{info, warn};

use crate::models::{RedemptionOutcome, TicketInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    AlreadyUsed,
    Invalid,
}

/// What the door operator is shown after a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanFeedback {
    Admitted { detail: Option<TicketInfo> },
    Denied(DenyReason),
    /// The ledger could not be consulted. Never shown as a denial.
    CannotVerify,
}

impl ScanFeedback {
    pub fn from_outcome(outcome: RedemptionOutcome, show_ticket_details: bool) -> Self {
        match outcome {
            RedemptionOutcome::Allow(info) => ScanFeedback::Admitted {
                detail: show_ticket_details.then_some(info),
            },
            RedemptionOutcome::AlreadyUsed(_) => ScanFeedback::Denied(DenyReason::AlreadyUsed),
            RedemptionOutcome::Invalid => ScanFeedback::Denied(DenyReason::Invalid),
            RedemptionOutcome::LookupError => ScanFeedback::CannotVerify,
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            ScanFeedback::Admitted { .. } => "ADMIT",
            ScanFeedback::Denied(DenyReason::AlreadyUsed) => "DENY: ticket already used",
            ScanFeedback::Denied(DenyReason::Invalid) => "DENY: not a valid ticket for today",
            ScanFeedback::CannotVerify => "CANNOT VERIFY: try again",
        }
    }
}

pub trait OperatorDisplay: Send {
    fn show(&mut self, feedback: &ScanFeedback);
    fn clear(&mut self);
}

/// Prints feedback through the log, for headless door devices.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl OperatorDisplay for ConsoleDisplay {
    fn show(&mut self, feedback: &ScanFeedback) {
        match feedback {
            ScanFeedback::Admitted { detail: Some(ticket) } => info!(
                holder = %ticket.holder_name,
                ticket_type = %ticket.ticket_type_name,
                event = %ticket.event_name,
                sequence_number = ticket.sequence_number,
                "{}",
                feedback.headline()
            ),
            ScanFeedback::Admitted { detail: None } | ScanFeedback::Denied(_) => {
                info!("{}", feedback.headline())
            }
            ScanFeedback::CannotVerify => warn!("{}", feedback.headline()),
        }
    }

    fn clear(&mut self) {
        info!("Ready for next scan");
    }
}
