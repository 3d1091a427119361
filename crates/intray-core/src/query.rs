// ABOUTME: The Querier capability: filter, search, order and group an in-memory record set.
// ABOUTME: QueryEngine is the default implementation and never touches persistence.

use crate::filter::Filter;
use crate::group::{GroupBy, GroupOptions, GroupResult, group_records};
use crate::model::Notification;
use crate::order::{SortOptions, order_unread_first, sort_records};
use crate::search::{Matcher, search};

/// How selected records are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Unread before read, original order within each partition.
    #[default]
    UnreadFirst,
    Sorted(SortOptions),
    /// Keep the input order.
    Preserve,
}

/// A complete description of what a caller wants from a record set.
#[derive(Default)]
pub struct Query {
    pub filter: Filter,
    pub matcher: Option<Box<dyn Matcher>>,
    pub order: ListOrder,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_order(mut self, order: ListOrder) -> Self {
        self.order = order;
        self
    }
}

/// Read-side capability over already-loaded records.
pub trait Querier {
    /// Filter, then search, then order. An empty result is not an error.
    fn select(&self, records: Vec<Notification>, query: &Query) -> Vec<Notification>;

    fn group(&self, records: Vec<Notification>, by: GroupBy, opts: &GroupOptions) -> GroupResult;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine;

impl Querier for QueryEngine {
    fn select(&self, records: Vec<Notification>, query: &Query) -> Vec<Notification> {
        let mut selected = query.filter.apply(records);
        if let Some(matcher) = &query.matcher {
            selected = search(selected, matcher.as_ref());
        }
        match query.order {
            ListOrder::UnreadFirst => order_unread_first(selected),
            ListOrder::Sorted(opts) => sort_records(selected, opts),
            ListOrder::Preserve => selected,
        }
    }

    fn group(&self, records: Vec<Notification>, by: GroupBy, opts: &GroupOptions) -> GroupResult {
        group_records(records, by, opts)
    }
}
