// ABOUTME: Combinable record filters: state, level, pane address, time cutoffs and read status.
// ABOUTME: All criteria are ANDed; an unset criterion matches everything.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{Level, Notification, NotificationState, days_before};

/// Which lifecycle states a query includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    Active,
    Dismissed,
    #[default]
    All,
}

impl StateFilter {
    pub fn accepts(&self, state: NotificationState) -> bool {
        match self {
            StateFilter::Active => state == NotificationState::Active,
            StateFilter::Dismissed => state == NotificationState::Dismissed,
            StateFilter::All => true,
        }
    }
}

impl FromStr for StateFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(StateFilter::Active),
            "dismissed" => Ok(StateFilter::Dismissed),
            "all" => Ok(StateFilter::All),
            other => Err(ValidationError::InvalidState(other.to_string())),
        }
    }
}

/// Read status is the presence of a read timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFilter {
    Read,
    Unread,
}

impl FromStr for ReadFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(ReadFilter::Read),
            "unread" => Ok(ReadFilter::Unread),
            other => Err(ValidationError::InvalidReadFilter(other.to_string())),
        }
    }
}

/// Filter criteria for a record set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub state: StateFilter,
    pub level: Option<Level>,
    pub session: Option<String>,
    pub window: Option<String>,
    pub pane: Option<String>,
    /// Keep records created strictly before this instant.
    pub older_than: Option<DateTime<Utc>>,
    /// Keep records created at or after this instant.
    pub newer_than: Option<DateTime<Utc>>,
    pub read: Option<ReadFilter>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: StateFilter) -> Self {
        self.state = state;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_read(mut self, read: ReadFilter) -> Self {
        self.read = Some(read);
        self
    }

    /// Set the older-than cutoff to `days` before `now`.
    pub fn older_than_days(mut self, days: u32, now: DateTime<Utc>) -> Self {
        self.older_than = Some(days_before(now, days));
        self
    }

    /// Set the newer-than cutoff to `days` before `now`.
    pub fn newer_than_days(mut self, days: u32, now: DateTime<Utc>) -> Self {
        self.newer_than = Some(days_before(now, days));
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Filter::default()
    }

    pub fn matches(&self, n: &Notification) -> bool {
        if !self.state.accepts(n.state) {
            return false;
        }
        if self.level.is_some_and(|level| level != n.level) {
            return false;
        }
        if !field_matches(&self.session, n.session())
            || !field_matches(&self.window, n.window())
            || !field_matches(&self.pane, n.pane())
        {
            return false;
        }
        if self.older_than.is_some_and(|cutoff| n.timestamp >= cutoff) {
            return false;
        }
        if self.newer_than.is_some_and(|cutoff| n.timestamp < cutoff) {
            return false;
        }
        match self.read {
            Some(ReadFilter::Read) => n.is_read(),
            Some(ReadFilter::Unread) => !n.is_read(),
            None => true,
        }
    }

    /// Keep matching records, preserving their order.
    pub fn apply(&self, records: Vec<Notification>) -> Vec<Notification> {
        if self.is_empty() {
            return records;
        }
        records.into_iter().filter(|n| self.matches(n)).collect()
    }
}

fn field_matches(wanted: &Option<String>, actual: Option<&str>) -> bool {
    match wanted {
        Some(w) => actual == Some(w.as_str()),
        None => true,
    }
}
