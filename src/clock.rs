//! Time source for the scheduler.
//!
//! Reminders are expressed in the single implicit local zone as
//! [`NaiveDateTime`]. All "now" reads go through [`Clock`] so delay
//! computation can be driven by a paused tokio clock in tests.

use chrono::{Local, NaiveDateTime};

/// Source of the current local wall-clock time.
pub trait Clock: Send + Sync {
    /// Current local time.
    fn now(&self) -> NaiveDateTime;
}

/// Production clock backed by the system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a fixed wall-clock anchor that advances with tokio time.
///
/// Under `#[tokio::test(start_paused = true)]` the tokio clock only moves
/// when the runtime is idle, so wall-clock reads and timer wakeups stay in
/// lockstep and scheduling tests become deterministic.
#[derive(Debug, Clone)]
pub struct AnchoredClock {
    anchor: NaiveDateTime,
    started: tokio::time::Instant,
}

impl AnchoredClock {
    /// Create a clock reading `anchor` at the current tokio instant.
    #[must_use]
    pub fn new(anchor: NaiveDateTime) -> Self {
        Self {
            anchor,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = tokio::time::Instant::now().duration_since(self.started);
        let elapsed = chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::MAX);
        self.anchor
            .checked_add_signed(elapsed)
            .unwrap_or(NaiveDateTime::MAX)
    }
}
