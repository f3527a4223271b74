//! Reminder scheduling and lifecycle.
//!
//! Reminders live in a per-owner [`ReminderStore`]; each live reminder is
//! driven by one timer task spawned by the [`ReminderEngine`].

pub mod engine;
pub mod interval;
pub mod model;
pub mod sink;
pub mod store;

pub use engine::{ReminderEngine, ReminderRequest};
pub use interval::RepeatKind;
pub use model::{LifecycleState, Owner, Reminder, ReminderId, RepeatBudget};
pub use sink::DeliverySink;
pub use store::{ExpiryDisposition, ReminderListing, ReminderStore};
