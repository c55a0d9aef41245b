use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::debouncer::{Admission, ScanDebouncer};
use super::display::{DenyReason, OperatorDisplay, ScanFeedback};
use crate::config::ScanConfig;
use crate::models::{RedemptionOutcome, VenueId};
use crate::services::codec;
use crate::services::gate::RedemptionGate;

enum Step {
    Continue,
    Stop,
}

/// One door device: payloads in, operator feedback out.
pub struct ScanSession<D> {
    gate: RedemptionGate,
    venue_id: VenueId,
    config: ScanConfig,
    debouncer: ScanDebouncer,
    display: D,
}

impl<D: OperatorDisplay> ScanSession<D> {
    pub fn new(gate: RedemptionGate, venue_id: VenueId, config: ScanConfig, display: D) -> Self {
        let debouncer = ScanDebouncer::new(config.quiet_interval, config.display_duration);
        Self {
            gate,
            venue_id,
            config,
            debouncer,
            display,
        }
    }

    /// Runs until `shutdown` fires or the payload stream closes, then hands
    /// the display back. A redemption still in flight at shutdown is dropped.
    pub async fn run(
        mut self,
        mut payloads: mpsc::Receiver<String>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> D {
        info!(venue_id = %self.venue_id, "Scan session started");
        loop {
            let clear_at = self.debouncer.showing_until();
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep_until(clear_at) => {
                    if self.debouncer.tick(Instant::now()) {
                        self.display.clear();
                    }
                }
                payload = payloads.recv() => {
                    let Some(payload) = payload else {
                        debug!("Payload stream closed");
                        break;
                    };
                    if let Step::Stop = self.scan(&payload, &mut shutdown).await {
                        break;
                    }
                }
            }
        }
        info!(venue_id = %self.venue_id, "Scan session stopped");
        self.display
    }

    async fn scan(&mut self, payload: &str, shutdown: &mut oneshot::Receiver<()>) -> Step {
        match self.debouncer.offer(payload, Instant::now()) {
            Admission::Admit => {}
            Admission::Duplicate | Admission::Busy => return Step::Continue,
        }

        let feedback = match codec::decode(payload) {
            Err(err) => {
                info!(error = %err, "Unreadable payload, not a ticket");
                ScanFeedback::Denied(DenyReason::Invalid)
            }
            Ok(code) => {
                let today = self.config.operating_day();
                let redemption = time::timeout(
                    self.config.lookup_timeout,
                    self.gate.redeem(&self.venue_id, today, &code),
                );
                let outcome = tokio::select! {
                    biased;
                    _ = &mut *shutdown => return Step::Stop,
                    outcome = redemption => outcome.unwrap_or_else(|_| {
                        warn!(%code, timeout_ms = millis(self.config.lookup_timeout), "Redemption timed out");
                        RedemptionOutcome::LookupError
                    }),
                };
                ScanFeedback::from_outcome(outcome, self.config.show_ticket_details)
            }
        };

        // A failed lookup must be retryable as soon as the screen clears.
        if feedback == ScanFeedback::CannotVerify {
            self.debouncer.forget_last();
        }
        self.display.show(&feedback);
        self.debouncer.show_result(Instant::now());
        Step::Continue
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
