//! Error types for the reminder service.

/// Top-level error type for reminder scheduling and its chat surface.
#[derive(Debug, thiserror::Error)]
pub enum NudgeError {
    /// Malformed request: bad date/time, missing arguments, non-numeric ordinal.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Ordinal out of range for the owner's current reminders.
    #[error("no reminder #{ordinal}; you have {available}")]
    NotFound {
        /// Requested 1-based ordinal.
        ordinal: usize,
        /// Number of reminders visible when the lookup ran.
        available: usize,
    },

    /// Delivery sink failed for one occurrence.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Chat channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, NudgeError>;
