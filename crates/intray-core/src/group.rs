// ABOUTME: Partitions a record set by session, window, pane or level into named groups.
// ABOUTME: Groups are emitted sorted by display name; members keep their input order.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ValidationError;
use crate::model::Notification;
use crate::search::NameMap;

/// Display name used for records with no value for the grouped field.
pub const EMPTY_GROUP_NAME: &str = "(none)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Session,
    Window,
    Pane,
    Level,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupBy::Session => "session",
            GroupBy::Window => "window",
            GroupBy::Pane => "pane",
            GroupBy::Level => "level",
        };
        f.write_str(s)
    }
}

impl FromStr for GroupBy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(GroupBy::Session),
            "window" => Ok(GroupBy::Window),
            "pane" => Ok(GroupBy::Pane),
            "level" => Ok(GroupBy::Level),
            other => Err(ValidationError::InvalidGroupBy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    /// Leave member lists empty and report counts only.
    pub count_only: bool,
    pub names: NameMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Full path of the group (e.g. session and window for window groups),
    /// so equal window names in different sessions stay apart.
    pub key: String,
    pub display_name: String,
    pub count: usize,
    pub unread_count: usize,
    pub members: Vec<Notification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupResult {
    pub group_by: GroupBy,
    pub groups: Vec<Group>,
    pub total_count: usize,
    pub total_unread: usize,
}

/// Group records by one field.
pub fn group_records(records: Vec<Notification>, by: GroupBy, opts: &GroupOptions) -> GroupResult {
    let total_count = records.len();
    let total_unread = records.iter().filter(|n| !n.is_read()).count();

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for n in records {
        let key = group_key(&n, by);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                display_name: display_name(&n, by, &opts.names),
                key,
                count: 0,
                unread_count: 0,
                members: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.count += 1;
        if !n.is_read() {
            group.unread_count += 1;
        }
        if !opts.count_only {
            group.members.push(n);
        }
    }

    groups.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.key.cmp(&b.key))
    });

    GroupResult {
        group_by: by,
        groups,
        total_count,
        total_unread,
    }
}

fn group_key(n: &Notification, by: GroupBy) -> String {
    let session = n.session().unwrap_or("");
    let window = n.window().unwrap_or("");
    let pane = n.pane().unwrap_or("");
    match by {
        GroupBy::Session => session.to_string(),
        GroupBy::Window => format!("{session}\x00{window}"),
        GroupBy::Pane => format!("{session}\x00{window}\x00{pane}"),
        GroupBy::Level => n.level.as_str().to_string(),
    }
}

fn display_name(n: &Notification, by: GroupBy, names: &NameMap) -> String {
    let (raw, lookup) = match by {
        GroupBy::Session => (n.session(), &names.sessions),
        GroupBy::Window => (n.window(), &names.windows),
        GroupBy::Pane => (n.pane(), &names.panes),
        GroupBy::Level => return n.level.as_str().to_string(),
    };
    match raw {
        Some(id) => lookup.get(id).cloned().unwrap_or_else(|| id.to_string()),
        None => EMPTY_GROUP_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, NewNotification, PaneAddress, now_utc};

    fn record(id: u64, level: Level, address: Option<(&str, &str, &str)>) -> Notification {
        let mut input = NewNotification::new(format!("m{id}")).with_level(level);
        input.address = address.map(|(s, w, p)| PaneAddress::new(s, w, p));
        input.into_notification(id, now_utc())
    }

    fn fixture() -> Vec<Notification> {
        vec![
            record(1, Level::Error, Some(("$2", "@1", "%1"))),
            record(2, Level::Info, Some(("$1", "@1", "%2"))),
            record(3, Level::Error, Some(("$2", "@3", "%4"))),
            record(4, Level::Info, None),
        ]
    }

    fn summary(result: &GroupResult) -> Vec<(String, usize)> {
        result
            .groups
            .iter()
            .map(|g| (g.display_name.clone(), g.count))
            .collect()
    }

    #[test]
    fn groups_by_level_sorted_by_name() {
        let result = group_records(fixture(), GroupBy::Level, &GroupOptions::default());
        assert_eq!(
            summary(&result),
            vec![("error".to_string(), 2), ("info".to_string(), 2)]
        );
        let ids: Vec<u64> = result.groups[0].members.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(result.total_count, 4);
        assert_eq!(result.total_unread, 4);
    }

    #[test]
    fn window_groups_keep_sessions_apart() {
        let result = group_records(fixture(), GroupBy::Window, &GroupOptions::default());
        // "@1" appears under two sessions and must form two groups.
        assert_eq!(
            summary(&result),
            vec![
                ("(none)".to_string(), 1),
                ("@1".to_string(), 1),
                ("@1".to_string(), 1),
                ("@3".to_string(), 1),
            ]
        );
        assert_eq!(result.groups[1].key, "$1\x00@1");
        assert_eq!(result.groups[2].key, "$2\x00@1");
    }

    #[test]
    fn session_groups_use_resolved_names() {
        let mut names = NameMap::default();
        names.sessions.insert("$2".to_string(), "api".to_string());
        names.sessions.insert("$1".to_string(), "web".to_string());
        let opts = GroupOptions {
            count_only: false,
            names,
        };
        let result = group_records(fixture(), GroupBy::Session, &opts);
        assert_eq!(
            summary(&result),
            vec![
                ("(none)".to_string(), 1),
                ("api".to_string(), 2),
                ("web".to_string(), 1),
            ]
        );
    }

    #[test]
    fn count_only_omits_members() {
        let mut records = fixture();
        records[0].mark_read(now_utc());
        let opts = GroupOptions {
            count_only: true,
            ..GroupOptions::default()
        };
        let result = group_records(records, GroupBy::Pane, &opts);
        assert_eq!(result.groups.len(), 4);
        assert!(result.groups.iter().all(|g| g.members.is_empty()));
        assert_eq!(result.total_unread, 3);
        let pane1 = result.groups.iter().find(|g| g.display_name == "%1").unwrap();
        assert_eq!((pane1.count, pane1.unread_count), (1, 0));
    }

    #[test]
    fn empty_input_gives_no_groups() {
        let result = group_records(Vec::new(), GroupBy::Session, &GroupOptions::default());
        assert!(result.groups.is_empty());
        assert_eq!(result.total_count, 0);
    }

    #[test]
    fn unknown_group_by_is_invalid_argument() {
        assert_eq!(
            "message".parse::<GroupBy>(),
            Err(ValidationError::InvalidGroupBy("message".to_string()))
        );
    }
}
