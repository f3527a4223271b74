//! Reminder record and its lifecycle types.

use crate::reminder::interval::RepeatKind;
use chrono::NaiveDateTime;
use uuid::Uuid;

/// Opaque identifier of the user or chat that owns a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner(String);

impl Owner {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Owner {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Stable internal identity of a reminder. Users address reminders by ordinal.
pub type ReminderId = Uuid;

/// Remaining repetitions of a repeating reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatBudget {
    /// Repeat until cancelled.
    Unlimited,
    /// Repeat this many more times.
    Remaining(u32),
}

impl RepeatBudget {
    /// Sentinel signed value used for [`RepeatBudget::Unlimited`].
    pub const UNLIMITED_SENTINEL: i64 = -1;

    /// Build a budget from a signed count where negative means unlimited.
    #[must_use]
    pub fn from_signed(count: i64) -> Self {
        if count < 0 {
            Self::Unlimited
        } else {
            Self::Remaining(u32::try_from(count).unwrap_or(u32::MAX))
        }
    }

    /// Signed representation: `-1` for unlimited, otherwise the count.
    #[must_use]
    pub fn as_signed(self) -> i64 {
        match self {
            Self::Unlimited => Self::UNLIMITED_SENTINEL,
            Self::Remaining(n) => i64::from(n),
        }
    }

    /// Record one delivered occurrence. Never goes below zero.
    pub fn consume(&mut self) {
        if let Self::Remaining(n) = self {
            *n = n.saturating_sub(1);
        }
    }

    #[must_use]
    pub fn is_exhausted(self) -> bool {
        self == Self::Remaining(0)
    }
}

impl std::fmt::Display for RepeatBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Remaining(n) => write!(f, "{n} left"),
        }
    }
}

/// Where a reminder is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// One-time reminder that has not fired yet.
    Active,
    /// Repeating reminder that will fire again.
    Repeating,
    /// Terminal: fired to completion or cancelled.
    Expired,
}

/// A scheduled reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub owner: Owner,
    pub message: String,
    /// First scheduled fire time. Never changes.
    pub original_time: NaiveDateTime,
    /// Next fire time. Only moves forward.
    pub next_time: NaiveDateTime,
    pub repeat_kind: Option<RepeatKind>,
    /// `None` for one-time reminders.
    pub repeat_budget: Option<RepeatBudget>,
    pub state: LifecycleState,
}

impl Reminder {
    /// Build a new record in `Active` or `Repeating` state.
    ///
    /// A repeating reminder without an explicit budget repeats until cancelled.
    pub fn new(
        owner: Owner,
        message: impl Into<String>,
        time: NaiveDateTime,
        repeat_kind: Option<RepeatKind>,
        repeat_budget: Option<RepeatBudget>,
    ) -> crate::Result<Self> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(crate::NudgeError::Validation(
                "reminder message must not be empty".to_owned(),
            ));
        }

        let (state, repeat_budget) = match (repeat_kind, repeat_budget) {
            (None, None) => (LifecycleState::Active, None),
            (None, Some(_)) => {
                return Err(crate::NudgeError::Validation(
                    "a repeat count needs a repeat kind".to_owned(),
                ));
            }
            (Some(_), Some(RepeatBudget::Remaining(0))) => {
                return Err(crate::NudgeError::Validation(
                    "repeat count must be at least 1".to_owned(),
                ));
            }
            (Some(_), budget) => (
                LifecycleState::Repeating,
                Some(budget.unwrap_or(RepeatBudget::Unlimited)),
            ),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            owner,
            message,
            original_time: time,
            next_time: time,
            repeat_kind,
            repeat_budget,
            state,
        })
    }

    #[must_use]
    pub fn is_repeating(&self) -> bool {
        self.repeat_kind.is_some()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state == LifecycleState::Expired
    }

    /// Notification text sent to the owner when an occurrence fires.
    #[must_use]
    pub fn notification_text(&self) -> String {
        match self.repeat_kind {
            Some(kind) => format!("Recurring reminder ({kind}): {}", self.message),
            None => format!("Reminder: {}", self.message),
        }
    }
}
