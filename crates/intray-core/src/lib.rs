// ABOUTME: Core library for intray: the notification record model, its line codec, and the query engine.
// ABOUTME: Pure data and logic shared by the store, the migration tool and the command-line surface.

pub mod error;
pub mod filter;
pub mod group;
pub mod model;
pub mod order;
pub mod query;
pub mod record;
pub mod search;

pub use error::ValidationError;
pub use filter::{Filter, ReadFilter, StateFilter};
pub use group::{Group, GroupBy, GroupOptions, GroupResult};
pub use model::{Level, NewNotification, Notification, NotificationState, PaneAddress};
pub use order::{SortField, SortOptions, SortOrder};
pub use query::{ListOrder, Querier, Query, QueryEngine};
pub use record::RecordError;
pub use search::{Matcher, NameMap, RegexMatcher, SearchField, SearchOptions, SubstringMatcher, TokenMatcher};
