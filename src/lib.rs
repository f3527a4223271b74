//! Nudge: a chat reminder scheduler.
//!
//! Users create one-time or repeating reminders through chat commands; each
//! live reminder is driven by its own timer task and delivered back to the
//! chat that created it.
//!
//! # Architecture
//!
//! - **Interval catalog**: repeat kinds and their fixed intervals
//! - **Reminder store**: per-owner active, repeating and expired buckets
//! - **Scheduling engine**: one cancellable timer task per live reminder
//! - **Delivery sink**: pluggable outbound notification path
//! - **Channels**: Telegram long-polling transport and a liveness endpoint

pub mod app_dirs;
pub mod channels;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod reminder;
#[doc(hidden)]
pub mod test_utils;

pub use clock::{AnchoredClock, Clock, SystemClock};
pub use commands::{Command, CommandHandler};
pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
pub use reminder::{
    DeliverySink, LifecycleState, Owner, Reminder, ReminderEngine, ReminderRequest, RepeatBudget,
    RepeatKind,
};
