/// Fixed-period tick that paces serial polling from the UI loop.

use std::time::{Duration, Instant};

/// Periodic tick driven from the UI loop. Runs only while started.
#[derive(Debug, Clone)]
pub struct PollTimer {
    period: Duration,
    next_due: Option<Instant>,
}

impl PollTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, next_due: None }
    }

    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns true at most once per period. A late check fires once and
    /// reschedules from `now`; missed ticks are not replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    /// Time left until the next tick, for scheduling a repaint
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}
