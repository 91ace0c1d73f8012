//! Adapters from "where column IN keys" queries to batch functions.
//!
//! Persistence queries return matching records in no particular order, and leave out keys with no
//! match entirely. A batch function, on the other hand, must return exactly one entry per key, in
//! key order. The adapters here bridge the two by reading the key back out of each record through
//! the [`Column`] the query selected by.

use super::Fetch;
use crate::record::{Column, Record};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;

/// The key type of a [`Source`].
pub type Key<S> = <<S as Source>::By as Column<<S as Source>::Record>>::Key;

/// A persistence query selecting records by one of their columns.
#[async_trait]
pub trait Source: Send + Sync + 'static {
    /// The records this query returns.
    type Record: Record;
    /// The column the query selects by.
    type By: Column<Self::Record>;
    /// Errors from persistence.
    type Error: std::error::Error + Send + Sync + 'static;

    /// A human readable name for this query, used in logs and errors.
    const NAME: &'static str;

    /// All records whose `By` column is any of `keys`, in any order.
    async fn find(&self, keys: &[Key<Self>]) -> Result<Vec<Self::Record>, Self::Error>;
}

/// A batch function resolving each key to at most one record, such as a record by primary key.
///
/// If the source returns more than one record for a key, the first one is used.
pub struct OneToOne<S>(pub S);

#[async_trait]
impl<S: Source> Fetch for OneToOne<S> {
    type Key = Key<S>;
    type Value = S::Record;
    type Error = S::Error;

    const NAME: &'static str = S::NAME;

    async fn fetch_many(&self, keys: &[Key<S>]) -> Result<Vec<Option<S::Record>>, S::Error> {
        let mut by_key = HashMap::new();
        for record in self.0.find(keys).await? {
            by_key
                .entry(S::By::of(&record).clone())
                .or_insert(record);
        }
        Ok(keys.iter().map(|key| by_key.get(key).cloned()).collect())
    }
}

/// A batch function resolving each key to all of the records which reference it, such as the posts
/// written by an author.
///
/// A key with no matching records resolves to an empty list, never to a missing value. Within each
/// list, records keep the order the source returned them in.
pub struct OneToMany<S>(pub S);

#[async_trait]
impl<S: Source> Fetch for OneToMany<S> {
    type Key = Key<S>;
    type Value = Vec<S::Record>;
    type Error = S::Error;

    const NAME: &'static str = S::NAME;

    async fn fetch_many(&self, keys: &[Key<S>]) -> Result<Vec<Option<Vec<S::Record>>>, S::Error> {
        let records = self.0.find(keys).await?;
        let mut groups: IndexMap<&Key<S>, Vec<S::Record>> =
            keys.iter().map(|key| (key, vec![])).collect();
        for record in records {
            if let Some(group) = groups.get_mut(S::By::of(&record)) {
                group.push(record);
            }
        }
        Ok(groups.into_values().map(Some).collect())
    }
}
