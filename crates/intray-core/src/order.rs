// ABOUTME: Ordering of record sets: the default unread-first stable partition and explicit field sorts.
// ABOUTME: Both are stable so records that compare equal keep their original relative order.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::Notification;

/// Place every unread record before every read record, keeping the
/// relative order inside each partition. This is not a sort by field.
pub fn order_unread_first(records: Vec<Notification>) -> Vec<Notification> {
    let (mut unread, read): (Vec<_>, Vec<_>) = records.into_iter().partition(|n| !n.is_read());
    unread.extend(read);
    unread
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Timestamp,
    Level,
    Session,
    Message,
    ReadStatus,
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "timestamp" => Ok(SortField::Timestamp),
            "level" => Ok(SortField::Level),
            "session" => Ok(SortField::Session),
            "message" => Ok(SortField::Message),
            "read_status" => Ok(SortField::ReadStatus),
            other => Err(ValidationError::InvalidSortField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ValidationError::InvalidSortOrder(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOptions {
    pub field: SortField,
    pub order: SortOrder,
    pub case_insensitive: bool,
}

impl SortOptions {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self {
            field,
            order,
            case_insensitive: false,
        }
    }
}

/// Stable sort by one field. Unread sorts before read in ascending order.
pub fn sort_records(mut records: Vec<Notification>, opts: SortOptions) -> Vec<Notification> {
    records.sort_by(|a, b| {
        let ord = compare(a, b, opts);
        match opts.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
    records
}

fn compare(a: &Notification, b: &Notification, opts: SortOptions) -> Ordering {
    match opts.field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Timestamp => a.timestamp.cmp(&b.timestamp),
        SortField::Level => a.level.cmp(&b.level),
        SortField::Session => text_cmp(
            a.session().unwrap_or(""),
            b.session().unwrap_or(""),
            opts.case_insensitive,
        ),
        SortField::Message => text_cmp(&a.message, &b.message, opts.case_insensitive),
        SortField::ReadStatus => a.is_read().cmp(&b.is_read()),
    }
}

fn text_cmp(a: &str, b: &str, case_insensitive: bool) -> Ordering {
    if case_insensitive {
        a.to_lowercase().cmp(&b.to_lowercase())
    } else {
        a.cmp(b)
    }
}
