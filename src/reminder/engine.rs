//! Per-reminder timer tasks.
//!
//! Every live reminder owns exactly one tokio task. The task sleeps until
//! `next_time`, delivers through the [`DeliverySink`], then either retires
//! the reminder or advances it by its catalog interval and loops.
//!
//! Cancellation is cooperative: the task races its sleep against its
//! cancellation token and checks the token again right after waking. A
//! delivery that has already started always completes; the task then stops
//! instead of rescheduling.

use crate::clock::{Clock, SystemClock};
use crate::config::{DeliveryConfig, DeliveryFailurePolicy};
use crate::reminder::interval::RepeatKind;
use crate::reminder::model::{Owner, Reminder, RepeatBudget};
use crate::reminder::sink::DeliverySink;
use crate::reminder::store::{ExpiryDisposition, ReminderListing, ReminderStore};
use crate::Result;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Validated request to create a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub owner: Owner,
    pub time: NaiveDateTime,
    pub message: String,
    pub repeat_kind: Option<RepeatKind>,
    /// `None` repeats until cancelled.
    pub repeat_count: Option<u32>,
}

/// Schedules reminders and owns their timer tasks.
#[derive(Clone)]
pub struct ReminderEngine {
    store: Arc<ReminderStore>,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<dyn Clock>,
    delivery: DeliveryConfig,
    tracker: TaskTracker,
}

impl ReminderEngine {
    /// Create an engine delivering through `sink`, using the system clock.
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            store: Arc::new(ReminderStore::new()),
            sink,
            clock: Arc::new(SystemClock),
            delivery: DeliveryConfig::default(),
            tracker: TaskTracker::new(),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the delivery failure policy.
    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn store(&self) -> &Arc<ReminderStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Store a new reminder and spawn its timer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create_reminder(&self, request: ReminderRequest) -> Result<Reminder> {
        let (reminder, cancel) = self.store.create(
            request.owner,
            request.message,
            request.time,
            request.repeat_kind,
            request.repeat_count.map(RepeatBudget::Remaining),
        )?;

        info!(
            owner = %reminder.owner,
            id = %reminder.id,
            at = %reminder.next_time,
            repeat = ?reminder.repeat_kind,
            "reminder scheduled"
        );

        let task = FireTask {
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            clock: Arc::clone(&self.clock),
            delivery: self.delivery.clone(),
        };
        self.tracker.spawn(task.run(reminder.clone(), cancel));
        Ok(reminder)
    }

    pub fn list(&self, owner: &Owner) -> ReminderListing {
        self.store.list(owner)
    }

    /// Delete the reminder at `ordinal`, stopping its task first.
    pub fn delete(&self, owner: &Owner, ordinal: usize) -> Result<Reminder> {
        self.store.delete(owner, ordinal)
    }

    /// Cancel the repeating reminder at `ordinal`.
    pub fn cancel(&self, owner: &Owner, ordinal: usize) -> Result<Reminder> {
        self.store.cancel(owner, ordinal)
    }

    pub fn clear_expired(&self, owner: &Owner) -> usize {
        self.store.clear_expired(owner)
    }

    /// Number of timer tasks that have not finished yet.
    pub fn running_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Stop every timer task and wait for them to exit.
    ///
    /// Reminders keep their current bucket; nothing is retired.
    pub async fn shutdown(&self) {
        self.store.root_token().cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("reminder engine stopped");
    }
}

struct FireTask {
    store: Arc<ReminderStore>,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<dyn Clock>,
    delivery: DeliveryConfig,
}

impl FireTask {
    async fn run(self, mut reminder: Reminder, cancel: CancellationToken) {
        loop {
            let delay = (reminder.next_time - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            if !delay.is_zero() {
                debug!(
                    id = %reminder.id,
                    delay_secs = delay.as_secs(),
                    "waiting for next occurrence"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            self.deliver(&reminder).await;

            let Some(kind) = reminder.repeat_kind else {
                self.store.transition_to_expired(&reminder, ExpiryDisposition::Retain);
                return;
            };

            if let Some(budget) = reminder.repeat_budget.as_mut() {
                budget.consume();
            }
            if reminder.repeat_budget.is_some_and(RepeatBudget::is_exhausted) {
                info!(id = %reminder.id, "repeating reminder finished its budget");
                if !self.store.transition_to_expired(&reminder, ExpiryDisposition::Retain) {
                    self.store.settle_budget(&reminder);
                }
                return;
            }

            let Some(next) = reminder.next_time.checked_add_signed(kind.interval()) else {
                warn!(id = %reminder.id, "next occurrence out of range; expiring");
                self.store.transition_to_expired(&reminder, ExpiryDisposition::Retain);
                return;
            };
            reminder.next_time = next;
            if !self.store.advance(&reminder) {
                // Cancelled while this occurrence was being delivered.
                self.store.settle_budget(&reminder);
                debug!(id = %reminder.id, "reminder no longer active; stopping");
                return;
            }
        }

        if self.store.root_token().is_cancelled() {
            debug!(id = %reminder.id, "timer task stopped by shutdown");
            return;
        }
        if self.store.transition_to_expired(&reminder, ExpiryDisposition::Retain) {
            info!(id = %reminder.id, "reminder cancelled");
        }
    }

    /// Deliver one occurrence. Failures are logged and never propagate.
    async fn deliver(&self, reminder: &Reminder) {
        let text = reminder.notification_text();
        let Err(err) = self.sink.deliver(&reminder.owner, &text).await else {
            info!(owner = %reminder.owner, id = %reminder.id, "reminder delivered");
            return;
        };
        warn!(owner = %reminder.owner, id = %reminder.id, "reminder delivery failed: {err}");

        if self.delivery.failure_policy == DeliveryFailurePolicy::RetryOnce {
            tokio::time::sleep(Duration::from_millis(self.delivery.retry_delay_ms)).await;
            match self.sink.deliver(&reminder.owner, &text).await {
                Ok(()) => info!(id = %reminder.id, "reminder delivered on retry"),
                Err(err) => warn!(id = %reminder.id, "retry failed, skipping occurrence: {err}"),
            }
        }
    }
}
