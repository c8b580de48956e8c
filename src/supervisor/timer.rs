//! Reconnection failsafe

use embassy_time::{Duration, Instant};

/// One-shot failsafe deadline for the reconnection sequence
///
/// Armed on entering `WaitServer` or `Error`, stopped in `Normal`. If the
/// deadline passes before the device is back in `Normal` it reboots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl ConnectionTimer {
    /// Stopped timer
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Start the countdown from `now` unless it is already running
    ///
    /// Returns `true` if the timer was started.
    pub fn arm(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.timeout);
        true
    }

    /// Cancel the countdown
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// True while counting down
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Absolute expiry, if running
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True if running and `now` is at or past the deadline
    #[must_use]
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}
