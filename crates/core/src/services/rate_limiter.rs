use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window call budget: at most `max_calls` within any trailing
/// `window`.
///
/// Checking and consuming are one operation (`try_consume`), and it takes
/// `&mut self`, so a shared limiter must sit behind a lock that covers the
/// whole call.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: VecDeque::new(),
        }
    }

    /// Consume one call if the budget allows it.
    pub fn try_consume(&mut self) -> bool {
        self.try_consume_at(Instant::now())
    }

    /// `try_consume` against an explicit clock reading.
    pub fn try_consume_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.calls.len() < self.max_calls {
            self.calls.push_back(now);
            true
        } else {
            false
        }
    }

    /// Calls still available at `now` without consuming any.
    pub fn remaining_at(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.max_calls.saturating_sub(self.calls.len())
    }

    pub fn remaining(&mut self) -> usize {
        self.remaining_at(Instant::now())
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    // Calls are recorded in order, so expired ones are always at the front.
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(50, Duration::from_secs(60))
    }
}
