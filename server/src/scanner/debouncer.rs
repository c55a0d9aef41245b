use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Forward the payload to the gate.
    Admit,
    /// Same payload as the last one forwarded, inside the quiet interval.
    Duplicate,
    /// A result is on screen; all input is dropped.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    ShowingResult { until: Instant },
}

/// Turns the camera's continuous frame stream into discrete scan attempts.
///
/// `Idle -> ShowingResult -> Idle`, with the last forwarded payload and its
/// instant remembered for the quiet-interval check. Instants come from the
/// caller so the machine stays pure.
#[derive(Debug)]
pub struct ScanDebouncer {
    quiet_interval: Duration,
    display_duration: Duration,
    phase: Phase,
    last_emitted: Option<(String, Instant)>,
}

impl ScanDebouncer {
    pub fn new(quiet_interval: Duration, display_duration: Duration) -> Self {
        Self {
            quiet_interval,
            display_duration,
            phase: Phase::Idle,
            last_emitted: None,
        }
    }

    pub fn offer(&mut self, payload: &str, now: Instant) -> Admission {
        self.tick(now);
        if let Phase::ShowingResult { .. } = self.phase {
            return Admission::Busy;
        }

        let payload = payload.trim();
        if let Some((last, at)) = &self.last_emitted {
            if last == payload && now.saturating_duration_since(*at) <= self.quiet_interval {
                return Admission::Duplicate;
            }
        }

        self.last_emitted = Some((payload.to_string(), now));
        Admission::Admit
    }

    /// Shuts the debouncer while a result is displayed.
    pub fn show_result(&mut self, now: Instant) {
        self.phase = Phase::ShowingResult {
            until: now + self.display_duration,
        };
    }

    /// Reopens once the display time has passed. Returns `true` on the
    /// transition back to idle, i.e. when the display should be cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.phase {
            Phase::ShowingResult { until } if now >= until => {
                self.phase = Phase::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drops the quiet-interval memory so the same payload is admitted as
    /// soon as the display clears.
    pub fn forget_last(&mut self) {
        self.last_emitted = None;
    }

    /// When the current result stops being displayed, if one is.
    pub fn showing_until(&self) -> Option<Instant> {
        match self.phase {
            Phase::ShowingResult { until } => Some(until),
            Phase::Idle => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }
}

impl Default for ScanDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_INTERVAL, DEFAULT_DISPLAY_DURATION)
    }
}
