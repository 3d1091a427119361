// ABOUTME: Defines the Notification record, its lifecycle state, severity level and pane address.
// ABOUTME: Also holds the validation rules applied to new notifications before they are stored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound on message length, counted in characters.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Textual timestamp layout used in persisted records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Current UTC time truncated to whole seconds so it survives a
/// format/parse round trip unchanged.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Format a timestamp in the persisted layout.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// `days` before `now`, clamped to the earliest representable instant.
pub fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parse any RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Lifecycle state. The only legal transition is Active -> Dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationState {
    Active,
    Dismissed,
}

impl NotificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationState::Active => "active",
            NotificationState::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for NotificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(NotificationState::Active),
            "dismissed" => Ok(NotificationState::Dismissed),
            other => Err(ValidationError::InvalidState(other.to_string())),
        }
    }
}

/// Severity level. Declaration order is severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Level::Info),
            "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            other => Err(ValidationError::InvalidLevel(other.to_string())),
        }
    }
}

/// Location of the pane that raised a notification. The three parts are
/// always present together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaneAddress {
    pub session: String,
    pub window: String,
    pub pane: String,
}

impl PaneAddress {
    pub fn new(
        session: impl Into<String>,
        window: impl Into<String>,
        pane: impl Into<String>,
    ) -> Self {
        Self {
            session: session.into(),
            window: window.into(),
            pane: pane.into(),
        }
    }

    /// Build an address from optional parts. Empty strings count as absent.
    /// Returns `Ok(None)` when all three are absent and an error when only
    /// some of them are given.
    pub fn from_parts(
        session: Option<&str>,
        window: Option<&str>,
        pane: Option<&str>,
    ) -> Result<Option<Self>, ValidationError> {
        let parts = [session, window, pane].map(|p| p.filter(|s| !s.is_empty()));
        let given = parts.iter().filter(|p| p.is_some()).count();
        match parts {
            [Some(s), Some(w), Some(p)] => Ok(Some(Self::new(s, w, p))),
            _ if given == 0 => Ok(None),
            _ => Err(ValidationError::PartialAddress { given }),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("session", &self.session),
            ("window", &self.window),
            ("pane", &self.pane),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::BlankField { field });
            }
            if has_forbidden_chars(value) {
                return Err(ValidationError::ForbiddenCharacter { field });
            }
        }
        Ok(())
    }
}

/// One inbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub state: NotificationState,
    pub address: Option<PaneAddress>,
    pub message: String,
    /// Creation time of the originating pane, as supplied by the caller.
    pub pane_created: Option<String>,
    pub level: Level,
    pub read_timestamp: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_timestamp.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.state == NotificationState::Active
    }

    pub fn session(&self) -> Option<&str> {
        self.address.as_ref().map(|a| a.session.as_str())
    }

    pub fn window(&self) -> Option<&str> {
        self.address.as_ref().map(|a| a.window.as_str())
    }

    pub fn pane(&self) -> Option<&str> {
        self.address.as_ref().map(|a| a.pane.as_str())
    }

    /// Move to Dismissed. Returns false if it already was; the read
    /// timestamp is left alone either way.
    pub fn dismiss(&mut self) -> bool {
        if self.state == NotificationState::Dismissed {
            return false;
        }
        self.state = NotificationState::Dismissed;
        true
    }

    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        self.read_timestamp = Some(at);
    }

    pub fn mark_unread(&mut self) {
        self.read_timestamp = None;
    }
}

/// Caller-supplied fields for a notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub message: String,
    pub address: Option<PaneAddress>,
    pub pane_created: Option<String>,
    pub level: Level,
}

impl NewNotification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            address: None,
            pane_created: None,
            level: Level::Info,
        }
    }

    pub fn with_address(mut self, address: PaneAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_pane_created(mut self, pane_created: impl Into<String>) -> Self {
        self.pane_created = Some(pane_created.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_message(&self.message)?;
        if let Some(address) = &self.address {
            address.validate()?;
        }
        if let Some(pane_created) = &self.pane_created
            && has_forbidden_chars(pane_created)
        {
            return Err(ValidationError::ForbiddenCharacter {
                field: "pane_created",
            });
        }
        Ok(())
    }

    /// Turn validated input into a stored record.
    pub fn into_notification(self, id: u64, timestamp: DateTime<Utc>) -> Notification {
        Notification {
            id,
            timestamp,
            state: NotificationState::Active,
            address: self.address,
            message: self.message,
            pane_created: self.pane_created.filter(|p| !p.is_empty()),
            level: self.level,
            read_timestamp: None,
        }
    }
}

/// Message must be non-blank and at most `MAX_MESSAGE_LEN` characters.
/// Tabs and line breaks are allowed here; the line codec escapes them.
pub fn validate_message(message: &str) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = message.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(())
}

fn has_forbidden_chars(value: &str) -> bool {
    value.contains(['\t', '\n', '\r'])
}
