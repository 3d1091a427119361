// ABOUTME: Pluggable search strategies (substring, regex, token) behind the Matcher trait.
// ABOUTME: Matches the message and pane address, including human-readable names when known.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::error::ValidationError;
use crate::model::Notification;

/// A search strategy. Implementations own their query so callers can swap
/// strategies without touching call sites.
pub trait Matcher: Send + Sync {
    fn matches(&self, n: &Notification) -> bool;

    /// Short identifier for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Record fields a matcher may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Message,
    Session,
    Window,
    Pane,
    Level,
    State,
}

/// Identifier-to-name maps supplied by the multiplexer collaborator.
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    pub sessions: HashMap<String, String>,
    pub windows: HashMap<String, String>,
    pub panes: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub case_insensitive: bool,
    pub fields: Vec<SearchField>,
    pub names: NameMap,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            fields: vec![
                SearchField::Message,
                SearchField::Session,
                SearchField::Window,
                SearchField::Pane,
            ],
            names: NameMap::default(),
        }
    }
}

impl SearchOptions {
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn with_fields(mut self, fields: Vec<SearchField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_names(mut self, names: NameMap) -> Self {
        self.names = names;
        self
    }

    /// Every searchable text of `n` under these options: raw field values
    /// plus resolved names for address parts.
    fn haystacks<'a>(&'a self, n: &'a Notification) -> Vec<&'a str> {
        let mut out = Vec::new();
        for field in &self.fields {
            match field {
                SearchField::Message => out.push(n.message.as_str()),
                SearchField::Level => out.push(n.level.as_str()),
                SearchField::State => out.push(n.state.as_str()),
                SearchField::Session => push_with_name(&mut out, n.session(), &self.names.sessions),
                SearchField::Window => push_with_name(&mut out, n.window(), &self.names.windows),
                SearchField::Pane => push_with_name(&mut out, n.pane(), &self.names.panes),
            }
        }
        out.retain(|s| !s.is_empty());
        out
    }
}

fn push_with_name<'a>(
    out: &mut Vec<&'a str>,
    id: Option<&'a str>,
    names: &'a HashMap<String, String>,
) {
    if let Some(id) = id {
        out.push(id);
        if let Some(name) = names.get(id) {
            out.push(name.as_str());
        }
    }
}

/// Matches when any searched field contains the query.
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    query: String,
    opts: SearchOptions,
}

impl SubstringMatcher {
    pub fn new(query: impl Into<String>, opts: SearchOptions) -> Self {
        let query = query.into();
        let query = if opts.case_insensitive {
            query.to_lowercase()
        } else {
            query
        };
        Self { query, opts }
    }
}

impl Matcher for SubstringMatcher {
    fn matches(&self, n: &Notification) -> bool {
        if self.query.is_empty() {
            return true;
        }
        self.opts
            .haystacks(n)
            .into_iter()
            .any(|text| contains(text, &self.query, self.opts.case_insensitive))
    }

    fn name(&self) -> &'static str {
        "substring"
    }
}

/// Matches when any searched field matches a regular expression. The
/// pattern is compiled once; an invalid pattern is rejected up front.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Option<Regex>,
    opts: SearchOptions,
}

impl RegexMatcher {
    pub fn new(pattern: &str, opts: SearchOptions) -> Result<Self, ValidationError> {
        let regex = if pattern.is_empty() {
            None
        } else {
            let compiled = RegexBuilder::new(pattern)
                .case_insensitive(opts.case_insensitive)
                .build()
                .map_err(|e| ValidationError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            Some(compiled)
        };
        Ok(Self { regex, opts })
    }
}

impl Matcher for RegexMatcher {
    fn matches(&self, n: &Notification) -> bool {
        match &self.regex {
            Some(re) => self.opts.haystacks(n).into_iter().any(|t| re.is_match(t)),
            None => true,
        }
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

/// Splits the query on whitespace; every token must match some field.
/// The bare tokens `read` and `unread` restrict by read status instead
/// (both together cancel out).
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    tokens: Vec<String>,
    want_read: Option<bool>,
    opts: SearchOptions,
}

impl TokenMatcher {
    pub fn new(query: &str, opts: SearchOptions) -> Self {
        let mut tokens = Vec::new();
        let (mut read, mut unread) = (false, false);
        for token in query.split_whitespace() {
            match token.to_lowercase().as_str() {
                "read" => read = true,
                "unread" => unread = true,
                lowered => tokens.push(if opts.case_insensitive {
                    lowered.to_string()
                } else {
                    token.to_string()
                }),
            }
        }
        let want_read = match (read, unread) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        };
        Self {
            tokens,
            want_read,
            opts,
        }
    }
}

impl Matcher for TokenMatcher {
    fn matches(&self, n: &Notification) -> bool {
        if self.want_read.is_some_and(|want| want != n.is_read()) {
            return false;
        }
        let haystacks = self.opts.haystacks(n);
        self.tokens.iter().all(|token| {
            haystacks
                .iter()
                .any(|text| contains(text, token, self.opts.case_insensitive))
        })
    }

    fn name(&self) -> &'static str {
        "token"
    }
}

fn contains(text: &str, needle: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        text.to_lowercase().contains(needle)
    } else {
        text.contains(needle)
    }
}

/// Keep records the matcher accepts, preserving order.
pub fn search(records: Vec<Notification>, matcher: &dyn Matcher) -> Vec<Notification> {
    let before = records.len();
    let kept: Vec<Notification> = records.into_iter().filter(|n| matcher.matches(n)).collect();
    tracing::trace!(matcher = matcher.name(), before, after = kept.len(), "search applied");
    kept
}
