//! Chat command parsing and reply formatting.
//!
//! Turns raw chat text into a structured [`Command`] and renders the
//! engine's answers as plain-text replies. Nothing here touches reminder
//! state directly; all mutation goes through [`ReminderEngine`].

use crate::reminder::{
    Owner, Reminder, ReminderEngine, ReminderListing, ReminderRequest, RepeatBudget, RepeatKind,
};
use crate::{NudgeError, Result};
use chrono::NaiveDateTime;

/// Accepted date/time input format (24-hour clock).
pub const DATE_TIME_FORMAT: &str = "%d-%m-%Y %H:%M";

pub const REMIND_USAGE: &str = "Usage: /remind dd-mm-yyyy HH:MM <message> \
[daily|weekly|monthly|quarterly|half-yearly|yearly [count]]";

const HELP: &str = "Hi! I'm your reminder bot.\n\
/remind dd-mm-yyyy HH:MM <message> [repeat [count]] - set a reminder\n\
/list - active reminders\n\
/repeating - repeating reminders\n\
/expired - expired reminders\n\
/delete <n> - delete reminder n\n\
/cancel <n> - stop repeating reminder n\n\
/clear - forget expired reminders\n\
Repeat options: daily, weekly, monthly, quarterly, half-yearly, yearly.\n\
Leave out the count, or use -1, to repeat until cancelled.";

/// Parsed `/remind` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemindArgs {
    pub time: NaiveDateTime,
    pub message: String,
    pub repeat_kind: Option<RepeatKind>,
    pub repeat_count: Option<u32>,
}

impl RemindArgs {
    pub fn into_request(self, owner: Owner) -> ReminderRequest {
        ReminderRequest {
            owner,
            time: self.time,
            message: self.message,
            repeat_kind: self.repeat_kind,
            repeat_count: self.repeat_count,
        }
    }
}

/// A chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Remind(RemindArgs),
    List,
    Repeating,
    Expired,
    Delete(usize),
    Cancel(usize),
    Clear,
}

/// Parse chat text. Returns `Ok(None)` for text that is not a command.
pub fn parse_command(text: &str) -> Result<Option<Command>> {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return Ok(None);
    };

    let (head, args) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    // Group chats address commands as `/list@botname`.
    let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = args.split_whitespace().collect();

    let command = match name.as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "remind" => Command::Remind(parse_remind_args(&args)?),
        "list" => Command::List,
        "repeating" => Command::Repeating,
        "expired" => Command::Expired,
        "delete" => Command::Delete(parse_ordinal(&args, "/delete")?),
        "cancel" => Command::Cancel(parse_ordinal(&args, "/cancel")?),
        "clear" => Command::Clear,
        other => {
            return Err(NudgeError::Validation(format!(
                "unknown command /{other}; try /help"
            )));
        }
    };
    Ok(Some(command))
}

fn parse_remind_args(args: &[&str]) -> Result<RemindArgs> {
    let [date, time, rest @ ..] = args else {
        return Err(NudgeError::Validation("missing date and time".to_owned()));
    };
    if rest.is_empty() {
        return Err(NudgeError::Validation("missing reminder message".to_owned()));
    }

    let stamp = format!("{date} {time}");
    let time = NaiveDateTime::parse_from_str(&stamp, DATE_TIME_FORMAT).map_err(|_| {
        NudgeError::Validation(format!("`{stamp}` is not a valid dd-mm-yyyy HH:MM time"))
    })?;

    // Trailing `<kind> [count]` is only taken when the kind is a known tag and
    // at least one message word remains; anything else is message text.
    let mut end = rest.len();
    let mut repeat_kind = None;
    let mut repeat_count = None;
    if end >= 3
        && looks_numeric(rest[end - 1])
        && let Some(kind) = RepeatKind::from_tag(rest[end - 2])
    {
        repeat_kind = Some(kind);
        repeat_count = parse_repeat_count(rest[end - 1])?;
        end -= 2;
    } else if end >= 2
        && let Some(kind) = RepeatKind::from_tag(rest[end - 1])
    {
        repeat_kind = Some(kind);
        end -= 1;
    }

    let joined = rest[..end].join(" ");
    let message = strip_quotes(&joined).trim().to_owned();
    if message.is_empty() {
        return Err(NudgeError::Validation("missing reminder message".to_owned()));
    }

    Ok(RemindArgs {
        time,
        message,
        repeat_kind,
        repeat_count,
    })
}

fn looks_numeric(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Repeat count after a kind tag. `-1` means repeat until cancelled.
fn parse_repeat_count(raw: &str) -> Result<Option<u32>> {
    match raw.parse::<i64>() {
        Ok(RepeatBudget::UNLIMITED_SENTINEL) => Ok(None),
        Ok(n) if n > 0 => u32::try_from(n).map(Some).map_err(|_| too_large(raw)),
        Ok(_) => Err(NudgeError::Validation(
            "repeat count must be at least 1, or -1 to repeat until cancelled".to_owned(),
        )),
        Err(_) => Err(too_large(raw)),
    }
}

fn too_large(raw: &str) -> NudgeError {
    NudgeError::Validation(format!("repeat count {raw} is too large"))
}

fn strip_quotes(s: &str) -> &str {
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if let Some(inner) = s.strip_prefix(open).and_then(|s| s.strip_suffix(close)) {
            return inner;
        }
    }
    s
}

fn parse_ordinal(args: &[&str], command: &str) -> Result<usize> {
    let [raw] = args else {
        return Err(NudgeError::Validation(format!("Usage: {command} <number>")));
    };
    raw.parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            NudgeError::Validation(format!(
                "`{raw}` is not a reminder number. Usage: {command} <number>"
            ))
        })
}

/// Formats a reminder time the way users type it.
pub fn format_time(time: NaiveDateTime) -> String {
    time.format(DATE_TIME_FORMAT).to_string()
}

fn format_active(ordinal: usize, reminder: &Reminder) -> String {
    match (reminder.repeat_kind, reminder.repeat_budget) {
        (Some(kind), Some(budget)) => format!(
            "{ordinal}. {}: {} (repeats {kind}, {budget})",
            format_time(reminder.next_time),
            reminder.message
        ),
        _ => format!(
            "{ordinal}. {}: {}",
            format_time(reminder.next_time),
            reminder.message
        ),
    }
}

fn format_expired(ordinal: usize, reminder: &Reminder) -> String {
    match reminder.repeat_kind {
        Some(kind) => format!(
            "{ordinal}. {}: {} (was {kind}, last {})",
            format_time(reminder.original_time),
            reminder.message,
            format_time(reminder.next_time)
        ),
        None => format!(
            "{ordinal}. {}: {}",
            format_time(reminder.original_time),
            reminder.message
        ),
    }
}

/// One-time and repeating reminders, numbered for `/delete` and `/cancel`.
pub fn format_active_listing(listing: &ReminderListing) -> String {
    let lines: Vec<String> = listing
        .numbered()
        .take(listing.expired_offset())
        .map(|(n, r)| format_active(n, r))
        .collect();
    if lines.is_empty() {
        return "You have no active reminders.".to_owned();
    }
    format!("Your active reminders:\n{}", lines.join("\n"))
}

pub fn format_repeating_listing(listing: &ReminderListing) -> String {
    let lines: Vec<String> = listing
        .numbered()
        .skip(listing.repeating_offset())
        .take(listing.repeating.len())
        .map(|(n, r)| format_active(n, r))
        .collect();
    if lines.is_empty() {
        return "You have no repeating reminders.".to_owned();
    }
    format!("Your repeating reminders:\n{}", lines.join("\n"))
}

pub fn format_expired_listing(listing: &ReminderListing) -> String {
    let lines: Vec<String> = listing
        .numbered()
        .skip(listing.expired_offset())
        .map(|(n, r)| format_expired(n, r))
        .collect();
    if lines.is_empty() {
        return "You have no expired reminders.".to_owned();
    }
    format!("Your expired reminders:\n{}", lines.join("\n"))
}

/// Dispatches parsed commands to the engine and renders replies.
#[derive(Clone)]
pub struct CommandHandler {
    engine: ReminderEngine,
}

impl CommandHandler {
    pub fn new(engine: ReminderEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ReminderEngine {
        &self.engine
    }

    /// Handle one inbound chat message. Returns `None` for non-command text.
    pub fn handle(&self, owner: &Owner, text: &str) -> Option<String> {
        let command = match parse_command(text) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(err) => return Some(self.render_error(err, text)),
        };
        Some(
            self.execute(owner, command)
                .unwrap_or_else(|err| self.render_error(err, text)),
        )
    }

    fn execute(&self, owner: &Owner, command: Command) -> Result<String> {
        match command {
            Command::Start | Command::Help => Ok(HELP.to_owned()),
            Command::Remind(args) => {
                let reminder = self.engine.create_reminder(args.into_request(owner.clone()))?;
                Ok(self.confirmation(&reminder))
            }
            Command::List => Ok(format_active_listing(&self.engine.list(owner))),
            Command::Repeating => Ok(format_repeating_listing(&self.engine.list(owner))),
            Command::Expired => Ok(format_expired_listing(&self.engine.list(owner))),
            Command::Delete(ordinal) => {
                let removed = self.engine.delete(owner, ordinal)?;
                Ok(format!("Deleted reminder #{ordinal}: {}", removed.message))
            }
            Command::Cancel(ordinal) => {
                let cancelled = self.engine.cancel(owner, ordinal)?;
                Ok(format!(
                    "Cancelled repeating reminder #{ordinal}: {}",
                    cancelled.message
                ))
            }
            Command::Clear => {
                let cleared = self.engine.clear_expired(owner);
                Ok(format!("Cleared {cleared} expired reminder(s)."))
            }
        }
    }

    fn confirmation(&self, reminder: &Reminder) -> String {
        let when = format_time(reminder.next_time);
        let mut reply = match (reminder.repeat_kind, reminder.repeat_budget) {
            (Some(kind), Some(budget)) => {
                format!("Repeating reminder set for {when} ({kind}, {budget})!")
            }
            _ => format!("Reminder set for {when}!"),
        };
        if reminder.next_time <= self.engine.clock().now() {
            reply.push_str(" That time has already passed, so it fires now.");
        }
        reply
    }

    fn render_error(&self, err: NudgeError, text: &str) -> String {
        match err {
            NudgeError::Validation(msg) if text.trim_start().starts_with("/remind") => {
                format!("Error: {msg}\n{REMIND_USAGE}")
            }
            NudgeError::Validation(msg) => format!("Error: {msg}"),
            other => format!("Error: {other}"),
        }
    }
}
