use std::time::{Duration, Instant};

/// Decides when the dashboard should run its next refresh pass.
///
/// The owner calls `is_due` on every timer tick, runs a pass when it returns
/// `true`, then records it with `mark_ran`. Live mode refreshes every
/// `interval`; a manual request makes the next tick due regardless of mode.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    interval: Duration,
    error_backoff: Duration,
    live: bool,
    manual_request: bool,
    last_run: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            error_backoff: Duration::from_secs(5),
            live: true,
            manual_request: false,
            last_run: None,
        }
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Pause after a failed pass before the loop tries again.
    pub fn error_backoff(&self) -> Duration {
        self.error_backoff
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    /// Flip live mode and return the new state.
    pub fn toggle_live(&mut self) -> bool {
        self.live = !self.live;
        self.live
    }

    /// Make the next tick run a pass.
    pub fn request_refresh(&mut self) {
        self.manual_request = true;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        if self.manual_request {
            return true;
        }
        if !self.live {
            return false;
        }
        match self.last_run {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark_ran(&mut self, now: Instant) {
        self.last_run = Some(now);
        self.manual_request = false;
    }

    /// Time left until the next live pass is due, zero if overdue.
    pub fn time_until_due(&self, now: Instant) -> Duration {
        match self.last_run {
            None => Duration::ZERO,
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
