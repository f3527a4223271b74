//! Per-owner reminder storage.
//!
//! Each owner has three buckets: one-time active, repeating, and expired.
//! Every bucket change happens under a single lock, so a [`ReminderListing`]
//! never shows a reminder twice or misses one that is mid-transition.
//!
//! Live reminders carry the cancellation token of their timer task. The
//! token is dropped when the reminder leaves its active bucket.

use crate::reminder::interval::RepeatKind;
use crate::reminder::model::{LifecycleState, Owner, Reminder, RepeatBudget};
use crate::{NudgeError, Result};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What happens to a reminder once it leaves its active bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDisposition {
    /// Append it to the expired bucket.
    Retain,
    /// Drop it entirely.
    Discard,
}

struct LiveEntry {
    reminder: Reminder,
    task: CancellationToken,
}

#[derive(Default)]
struct UserReminderSet {
    one_time: Vec<LiveEntry>,
    repeating: Vec<LiveEntry>,
    expired: Vec<Reminder>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    OneTime(usize),
    Repeating(usize),
    Expired(usize),
}

impl UserReminderSet {
    fn len(&self) -> usize {
        self.one_time.len() + self.repeating.len() + self.expired.len()
    }

    /// Resolve a 1-based display ordinal.
    fn locate(&self, ordinal: usize) -> Option<Slot> {
        let index = ordinal.checked_sub(1)?;
        let repeating_start = self.one_time.len();
        let expired_start = repeating_start + self.repeating.len();
        if index < repeating_start {
            Some(Slot::OneTime(index))
        } else if index < expired_start {
            Some(Slot::Repeating(index - repeating_start))
        } else if index < self.len() {
            Some(Slot::Expired(index - expired_start))
        } else {
            None
        }
    }

    fn reminder_at(&self, slot: Slot) -> &Reminder {
        match slot {
            Slot::OneTime(i) => &self.one_time[i].reminder,
            Slot::Repeating(i) => &self.repeating[i].reminder,
            Slot::Expired(i) => &self.expired[i],
        }
    }

    /// Check-and-remove from the active buckets. Only the caller that
    /// actually removes the entry gets `true`.
    fn expire(&mut self, latest: &Reminder, disposition: ExpiryDisposition) -> bool {
        let bucket = if latest.is_repeating() {
            &mut self.repeating
        } else {
            &mut self.one_time
        };
        let Some(pos) = bucket.iter().position(|e| e.reminder.id == latest.id) else {
            return false;
        };

        let LiveEntry { mut reminder, task } = bucket.remove(pos);
        drop(task);
        if latest.next_time >= reminder.next_time {
            reminder.next_time = latest.next_time;
            reminder.repeat_budget = latest.repeat_budget;
        }
        reminder.state = LifecycleState::Expired;
        if disposition == ExpiryDisposition::Retain {
            self.expired.push(reminder);
        }
        true
    }
}

/// Snapshot of one owner's reminders in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderListing {
    pub one_time: Vec<Reminder>,
    pub repeating: Vec<Reminder>,
    pub expired: Vec<Reminder>,
}

impl ReminderListing {
    /// Total number of reminders across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.one_time.len() + self.repeating.len() + self.expired.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reminders with their 1-based ordinals, in display order.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &Reminder)> {
        self.one_time
            .iter()
            .chain(&self.repeating)
            .chain(&self.expired)
            .enumerate()
            .map(|(i, r)| (i + 1, r))
    }

    /// Ordinal of the first repeating reminder.
    #[must_use]
    pub fn repeating_offset(&self) -> usize {
        self.one_time.len()
    }

    /// Ordinal of the first expired reminder.
    #[must_use]
    pub fn expired_offset(&self) -> usize {
        self.one_time.len() + self.repeating.len()
    }
}

/// Shared reminder store for all owners.
pub struct ReminderStore {
    users: Mutex<HashMap<Owner, UserReminderSet>>,
    root: CancellationToken,
}

impl Default for ReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
        }
    }

    /// Parent of every task token handed out by [`create`](Self::create).
    /// Cancelling it stops all timer tasks.
    #[must_use]
    pub fn root_token(&self) -> &CancellationToken {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Owner, UserReminderSet>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a reminder and append it to the matching active bucket.
    ///
    /// Returns the record plus the cancellation token its timer task must
    /// observe.
    pub fn create(
        &self,
        owner: Owner,
        message: impl Into<String>,
        time: NaiveDateTime,
        repeat_kind: Option<RepeatKind>,
        repeat_budget: Option<RepeatBudget>,
    ) -> Result<(Reminder, CancellationToken)> {
        let reminder = Reminder::new(owner, message, time, repeat_kind, repeat_budget)?;
        let task = self.root.child_token();

        let mut users = self.lock();
        let set = users.entry(reminder.owner.clone()).or_default();
        let entry = LiveEntry {
            reminder: reminder.clone(),
            task: task.clone(),
        };
        if reminder.is_repeating() {
            set.repeating.push(entry);
        } else {
            set.one_time.push(entry);
        }
        debug!(
            owner = %reminder.owner,
            id = %reminder.id,
            at = %reminder.next_time,
            "reminder created"
        );

        Ok((reminder, task))
    }

    /// Snapshot of all three buckets for `owner`.
    #[must_use]
    pub fn list(&self, owner: &Owner) -> ReminderListing {
        let users = self.lock();
        let Some(set) = users.get(owner) else {
            return ReminderListing::default();
        };
        ReminderListing {
            one_time: set.one_time.iter().map(|e| e.reminder.clone()).collect(),
            repeating: set.repeating.iter().map(|e| e.reminder.clone()).collect(),
            expired: set.expired.clone(),
        }
    }

    /// Resolve a 1-based ordinal to a copy of the reminder it addresses.
    pub fn resolve(&self, owner: &Owner, ordinal: usize) -> Result<Reminder> {
        let users = self.lock();
        let set = users.get(owner);
        let available = set.map_or(0, UserReminderSet::len);
        set.and_then(|s| s.locate(ordinal).map(|slot| s.reminder_at(slot).clone()))
            .ok_or(NudgeError::NotFound { ordinal, available })
    }

    /// Delete the reminder at `ordinal`, stopping its timer task if it has one.
    pub fn delete(&self, owner: &Owner, ordinal: usize) -> Result<Reminder> {
        let mut users = self.lock();
        let set = users.get_mut(owner);
        let available = set.as_ref().map_or(0, |s| s.len());
        let Some((set, slot)) = set.and_then(|s| s.locate(ordinal).map(|slot| (s, slot))) else {
            return Err(NudgeError::NotFound { ordinal, available });
        };

        let removed = match slot {
            Slot::OneTime(i) => {
                let entry = set.one_time.remove(i);
                entry.task.cancel();
                entry.reminder
            }
            Slot::Repeating(i) => {
                let entry = set.repeating.remove(i);
                entry.task.cancel();
                entry.reminder
            }
            Slot::Expired(i) => set.expired.remove(i),
        };
        debug!(owner = %owner, id = %removed.id, ordinal, "reminder deleted");
        Ok(removed)
    }

    /// Cancel the repeating reminder at `ordinal` and move it to expired.
    ///
    /// The timer task is signalled first; it may still finish an occurrence
    /// it already committed to, but it will not reschedule.
    pub fn cancel(&self, owner: &Owner, ordinal: usize) -> Result<Reminder> {
        let mut users = self.lock();
        let set = users.get_mut(owner);
        let available = set.as_ref().map_or(0, |s| s.len());
        let Some((set, slot)) = set.and_then(|s| s.locate(ordinal).map(|slot| (s, slot))) else {
            return Err(NudgeError::NotFound { ordinal, available });
        };

        let i = match slot {
            Slot::Repeating(i) => i,
            Slot::OneTime(_) => {
                return Err(NudgeError::Validation(format!(
                    "reminder #{ordinal} is one-time; only repeating reminders can be cancelled \
                     (use /delete)"
                )));
            }
            Slot::Expired(_) => {
                return Err(NudgeError::Validation(format!(
                    "reminder #{ordinal} has already expired"
                )));
            }
        };

        let entry = &set.repeating[i];
        entry.task.cancel();
        let mut reminder = entry.reminder.clone();
        set.expire(&reminder, ExpiryDisposition::Retain);
        reminder.state = LifecycleState::Expired;
        debug!(owner = %owner, id = %reminder.id, ordinal, "repeating reminder cancelled");
        Ok(reminder)
    }

    /// Write a task's advanced `next_time` and budget back to the live record.
    ///
    /// Returns `false` when the reminder is no longer active, in which case
    /// the task must stop.
    pub fn advance(&self, reminder: &Reminder) -> bool {
        let mut users = self.lock();
        let Some(entry) = users
            .get_mut(&reminder.owner)
            .and_then(|s| s.repeating.iter_mut().find(|e| e.reminder.id == reminder.id))
        else {
            return false;
        };
        if reminder.next_time < entry.reminder.next_time {
            return false;
        }
        entry.reminder.next_time = reminder.next_time;
        entry.reminder.repeat_budget = reminder.repeat_budget;
        true
    }

    /// Move a reminder out of its active bucket.
    ///
    /// Natural completion, cancellation and deletion all converge here. The
    /// first caller wins and returns `true`; later callers are no-ops.
    pub fn transition_to_expired(
        &self,
        reminder: &Reminder,
        disposition: ExpiryDisposition,
    ) -> bool {
        let mut users = self.lock();
        let Some(set) = users.get_mut(&reminder.owner) else {
            return false;
        };
        let moved = set.expire(reminder, disposition);
        if moved {
            debug!(owner = %reminder.owner, id = %reminder.id, ?disposition, "reminder expired");
        }
        moved
    }

    /// Lower the budget of an already expired reminder to `reminder`'s.
    ///
    /// Used by a timer task whose occurrence finished after a cancel retired
    /// the record, so the expired copy counts that delivery. Never raises a
    /// budget and never touches live reminders.
    pub fn settle_budget(&self, reminder: &Reminder) -> bool {
        let mut users = self.lock();
        let Some(record) = users
            .get_mut(&reminder.owner)
            .and_then(|s| s.expired.iter_mut().find(|r| r.id == reminder.id))
        else {
            return false;
        };
        match (record.repeat_budget, reminder.repeat_budget) {
            (Some(RepeatBudget::Remaining(stored)), Some(RepeatBudget::Remaining(latest)))
                if latest < stored =>
            {
                record.repeat_budget = reminder.repeat_budget;
                true
            }
            _ => false,
        }
    }

    /// Drop every expired reminder for `owner`. Returns how many were removed.
    pub fn clear_expired(&self, owner: &Owner) -> usize {
        let mut users = self.lock();
        users
            .get_mut(owner)
            .map_or(0, |s| std::mem::take(&mut s.expired).len())
    }

    /// Number of reminders that still own a timer task, across all owners.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock()
            .values()
            .map(|s| s.one_time.len() + s.repeating.len())
            .sum()
    }
}
