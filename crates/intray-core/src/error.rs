// ABOUTME: Validation errors raised when caller input or a persisted field violates the record model.
// ABOUTME: Each variant names the offending field or condition so write failures are actionable.

use thiserror::Error;

/// Input that the record model or query engine refuses. This is the
/// InvalidArgument family of the error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message is {len} characters, maximum is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("session, window and pane must be given together (got {given} of 3)")]
    PartialAddress { given: usize },

    #[error("{field} cannot be blank")]
    BlankField { field: &'static str },

    #[error("{field} must not contain tab or line-break characters")]
    ForbiddenCharacter { field: &'static str },

    #[error("invalid level '{0}', must be one of: info, warning, error, critical")]
    InvalidLevel(String),

    #[error("invalid state '{0}', must be one of: active, dismissed, all")]
    InvalidState(String),

    #[error("invalid read status '{0}', must be one of: read, unread")]
    InvalidReadFilter(String),

    #[error("invalid group-by '{0}', must be one of: session, window, pane, level")]
    InvalidGroupBy(String),

    #[error("invalid sort field '{0}', must be one of: id, timestamp, level, session, message, read_status")]
    InvalidSortField(String),

    #[error("invalid sort order '{0}', must be one of: asc, desc")]
    InvalidSortOrder(String),

    #[error("invalid search pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
