// ABOUTME: Encodes and decodes the one-record-per-line, tab-separated persisted format.
// ABOUTME: Escapes message content so a field never contains the delimiter or a line break.

use thiserror::Error;

use crate::model::{
    Level, Notification, NotificationState, PaneAddress, format_timestamp, parse_timestamp,
};

/// Field separator in the persisted format.
pub const DELIMITER: char = '\t';

pub const FIELD_ID: usize = 0;
pub const FIELD_TIMESTAMP: usize = 1;
pub const FIELD_STATE: usize = 2;
pub const FIELD_SESSION: usize = 3;
pub const FIELD_WINDOW: usize = 4;
pub const FIELD_PANE: usize = 5;
pub const FIELD_MESSAGE: usize = 6;
pub const FIELD_PANE_CREATED: usize = 7;
pub const FIELD_LEVEL: usize = 8;
pub const FIELD_READ_TIMESTAMP: usize = 9;
pub const NUM_FIELDS: usize = 10;
/// Lines written before read tracking existed have no trailing field.
pub const MIN_FIELDS: usize = NUM_FIELDS - 1;

/// Largest id a record may carry. Ids must fit a signed 64-bit column.
pub const MAX_ID: u64 = i64::MAX as u64;

/// Why a single line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid field count: got {got}, expected {MIN_FIELDS} or {NUM_FIELDS}")]
    FieldCount { got: usize },

    #[error("invalid notification id '{0}'")]
    InvalidId(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid state '{0}'")]
    InvalidState(String),

    #[error("invalid level '{0}'")]
    InvalidLevel(String),

    #[error("invalid read timestamp '{0}'")]
    InvalidReadTimestamp(String),

    #[error("partial pane address: session, window and pane must all be set or all be empty")]
    PartialAddress,
}

/// Escape backslashes, tabs and line breaks so the message fits in one field.
pub fn escape_message(msg: &str) -> String {
    let mut out = String::with_capacity(msg.len());
    for c in msg.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse `escape_message` in one pass. Unknown escapes are kept verbatim.
pub fn unescape_message(msg: &str) -> String {
    let mut out = String::with_capacity(msg.len());
    let mut chars = msg.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Render a record as one line, without the trailing newline.
pub fn encode_line(n: &Notification) -> String {
    let (session, window, pane) = match &n.address {
        Some(a) => (a.session.as_str(), a.window.as_str(), a.pane.as_str()),
        None => ("", "", ""),
    };
    let read_timestamp = n
        .read_timestamp
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_default();

    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        n.id,
        format_timestamp(&n.timestamp),
        n.state,
        session,
        window,
        pane,
        escape_message(&n.message),
        n.pane_created.as_deref().unwrap_or(""),
        n.level,
        read_timestamp,
    )
}

/// Parse one line into a record.
pub fn decode_line(line: &str) -> Result<Notification, RecordError> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    if fields.len() != NUM_FIELDS && fields.len() != MIN_FIELDS {
        return Err(RecordError::FieldCount { got: fields.len() });
    }

    let id = parse_id(fields[FIELD_ID])?;

    let timestamp = parse_timestamp(fields[FIELD_TIMESTAMP])
        .ok_or_else(|| RecordError::InvalidTimestamp(fields[FIELD_TIMESTAMP].to_string()))?;

    let state: NotificationState = fields[FIELD_STATE]
        .parse()
        .map_err(|_| RecordError::InvalidState(fields[FIELD_STATE].to_string()))?;

    let address = PaneAddress::from_parts(
        Some(fields[FIELD_SESSION]),
        Some(fields[FIELD_WINDOW]),
        Some(fields[FIELD_PANE]),
    )
    .map_err(|_| RecordError::PartialAddress)?;

    let level: Level = fields[FIELD_LEVEL]
        .parse()
        .map_err(|_| RecordError::InvalidLevel(fields[FIELD_LEVEL].to_string()))?;

    let read_timestamp = match fields.get(FIELD_READ_TIMESTAMP).copied() {
        None | Some("") => None,
        Some(raw) => Some(
            parse_timestamp(raw).ok_or_else(|| RecordError::InvalidReadTimestamp(raw.to_string()))?,
        ),
    };

    let pane_created = Some(fields[FIELD_PANE_CREATED])
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    Ok(Notification {
        id,
        timestamp,
        state,
        address,
        message: unescape_message(fields[FIELD_MESSAGE]),
        pane_created,
        level,
        read_timestamp,
    })
}

/// Read only the id of a line. Used for id allocation and lookups that
/// should not pay for a full decode.
pub fn peek_id(line: &str) -> Option<u64> {
    let raw = line.split(DELIMITER).next()?;
    parse_id(raw).ok()
}

/// Read only the state of a line, stopping at the third field.
pub fn peek_state(line: &str) -> Option<NotificationState> {
    line.split(DELIMITER).nth(FIELD_STATE)?.parse().ok()
}

fn parse_id(raw: &str) -> Result<u64, RecordError> {
    match raw.parse::<u64>() {
        Ok(id) if (1..=MAX_ID).contains(&id) => Ok(id),
        _ => Err(RecordError::InvalidId(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_utc;

    fn sample() -> Notification {
        Notification {
            id: 7,
            timestamp: parse_timestamp("2025-01-02T03:04:05Z").unwrap(),
            state: NotificationState::Active,
            address: Some(PaneAddress::new("$0", "@1", "%2")),
            message: "tests\tpassed\nsee C:\\logs".to_string(),
            pane_created: Some("1735787045".to_string()),
            level: Level::Warning,
            read_timestamp: None,
        }
    }

    #[test]
    fn encode_produces_fixed_field_order() {
        let line = encode_line(&sample());
        assert_eq!(
            line,
            "7\t2025-01-02T03:04:05Z\tactive\t$0\t@1\t%2\ttests\\tpassed\\nsee C:\\\\logs\t1735787045\twarning\t"
        );
        assert!(!line.contains('\n'));
        assert_eq!(line.split('\t').count(), NUM_FIELDS);
    }

    #[test]
    fn decode_restores_escaped_message_exactly() {
        let mut n = sample();
        n.read_timestamp = Some(now_utc());
        let decoded = decode_line(&encode_line(&n)).unwrap();
        assert_eq!(decoded, n);
    }

    #[test]
    fn unescape_handles_literal_backslash_before_letter() {
        // A message containing the two characters '\' 'n' must not become a newline.
        let original = "path\\n and \\t";
        assert_eq!(unescape_message(&escape_message(original)), original);
        assert_eq!(unescape_message("trailing\\"), "trailing\\");
        assert_eq!(unescape_message("odd\\q"), "odd\\q");
    }

    #[test]
    fn decode_accepts_legacy_nine_field_lines() {
        let line = "3\t2025-01-02T03:04:05Z\tdismissed\t\t\t\thello\t\terror";
        let n = decode_line(line).unwrap();
        assert_eq!(n.id, 3);
        assert_eq!(n.state, NotificationState::Dismissed);
        assert!(n.address.is_none());
        assert!(n.read_timestamp.is_none());
        assert_eq!(n.level, Level::Error);
    }

    #[test]
    fn decode_reports_the_offending_field() {
        assert_eq!(
            decode_line("1\t2"),
            Err(RecordError::FieldCount { got: 2 })
        );
        assert_eq!(
            decode_line("x\t2025-01-02T03:04:05Z\tactive\t\t\t\tm\t\tinfo\t"),
            Err(RecordError::InvalidId("x".to_string()))
        );
        assert_eq!(
            decode_line("0\t2025-01-02T03:04:05Z\tactive\t\t\t\tm\t\tinfo\t"),
            Err(RecordError::InvalidId("0".to_string()))
        );
        assert_eq!(
            decode_line("1\tnope\tactive\t\t\t\tm\t\tinfo\t"),
            Err(RecordError::InvalidTimestamp("nope".to_string()))
        );
        assert_eq!(
            decode_line("1\t2025-01-02T03:04:05Z\tall\t\t\t\tm\t\tinfo\t"),
            Err(RecordError::InvalidState("all".to_string()))
        );
        assert_eq!(
            decode_line("1\t2025-01-02T03:04:05Z\tactive\t$1\t\t\tm\t\tinfo\t"),
            Err(RecordError::PartialAddress)
        );
        assert_eq!(
            decode_line("1\t2025-01-02T03:04:05Z\tactive\t\t\t\tm\t\tinfo\tlater"),
            Err(RecordError::InvalidReadTimestamp("later".to_string()))
        );
    }

    #[test]
    fn peek_helpers_read_leading_fields() {
        let line = encode_line(&sample());
        assert_eq!(peek_id(&line), Some(7));
        assert_eq!(peek_state(&line), Some(NotificationState::Active));
        assert_eq!(peek_id("garbage"), None);
        assert_eq!(peek_state("1\t2"), None);
    }

    #[test]
    fn ids_are_bounded_by_the_signed_range() {
        let line = |id: &str| format!("{id}\t2025-01-02T03:04:05Z\tactive\t\t\t\tm\t\tinfo\t");
        assert_eq!(decode_line(&line(&MAX_ID.to_string())).unwrap().id, MAX_ID);
        assert_eq!(
            decode_line(&line("9223372036854775808")),
            Err(RecordError::InvalidId("9223372036854775808".to_string()))
        );
        assert_eq!(peek_id(&line(&u64::MAX.to_string())), None);
    }

    #[test]
    fn carriage_returns_are_escaped() {
        let mut n = sample();
        n.message = "progress 50%\rprogress 100%\r".to_string();
        let line = encode_line(&n);
        assert!(!line.contains('\r'));
        assert!(line.contains("50%\\rprogress"));
        assert_eq!(decode_line(&line).unwrap().message, n.message);
    }
}
