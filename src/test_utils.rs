//! Test doubles shared by unit and integration tests.

use crate::clock::Clock;
use crate::reminder::model::Owner;
use crate::reminder::sink::DeliverySink;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One notification that reached the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub owner: Owner,
    pub text: String,
    /// Clock reading at delivery, when the sink was given a clock.
    pub at: Option<NaiveDateTime>,
}

/// Delivery sink that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Delivered>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    latency: Duration,
    clock: Option<Arc<dyn Clock>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp each delivery with `clock.now()`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fail the first `n` delivery attempts.
    #[must_use]
    pub fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Take `latency` (tokio time) to complete each attempt.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Successful deliveries so far.
    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Every call to `deliver`, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, owner: &Owner, text: &str) -> crate::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(crate::NudgeError::Delivery("simulated failure".to_owned()));
        }

        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Delivered {
                owner: owner.clone(),
                text: text.to_owned(),
                at: self.clock.as_ref().map(|c| c.now()),
            });
        Ok(())
    }
}
