//! Records returned by persistence queries, and the columns loaders key them by.
//!
//! A [`Record`] is one row of a persistence query. A [`Column`] is a typed handle for one field of
//! a record, which a loader uses both to build "where column IN keys" queries and to pull the key
//! back out of each returned record, so results can be aligned with the keys that requested them.
//!
//! Both traits are normally implemented with the [`Record`](derive@Record) derive macro:
//!
//! ```
//! # mod example {
//! use batched_graphql::{key::EntityId, record::{Column, Record}};
//!
//! #[derive(Clone, Record)]
//! struct Like {
//!     #[record(column)]
//!     post_id: EntityId,
//!     #[record(column)]
//!     user_id: EntityId,
//! }
//!
//! # pub fn example() {
//! let like = Like {
//!     post_id: EntityId::random(),
//!     user_id: EntityId::random(),
//! };
//! assert_eq!(like::UserId::of(&like), &like.user_id);
//! # }
//! # }
//! # example::example();
//! ```

use crate::key::FetchKey;

pub use batched_graphql_derive::Record;

/// A row produced by a persistence query.
pub trait Record: Clone + Send + Sync + 'static {
    /// A human readable name for this kind of record.
    const NAME: &'static str;
}

/// A field of a record `R` which loaders can fetch and group by.
pub trait Column<R>: Send + Sync + 'static {
    /// The type of this field, which doubles as the key of loaders fetching by it.
    type Key: FetchKey;

    /// The name of this field.
    const NAME: &'static str;

    /// The value of this field in `record`.
    fn of(record: &R) -> &Self::Key;
}
