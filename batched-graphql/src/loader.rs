//! Request-scoped batching and caching of data fetches.
//!
//! Resolving a graph-shaped query field by field naturally issues one fetch per parent object: a
//! list of 100 users, each with a profile, would cost 101 round trips to persistence. The types in
//! this module collapse all of those fetches into one per relationship and per tick of the
//! executor.
//!
//! The layers, from the bottom up, are:
//! * [`Fetch`]: a batch function, which maps a list of distinct keys to a positionally aligned list
//!   of optional values in a single call.
//! * [`BatchScheduler`]: coalesces every [`load`](BatchScheduler::load) issued during one tick into
//!   a single [`Fetch::fetch_many`] call, and fans the results back out to every caller.
//! * [`Loader`]: a per-request memo in front of a scheduler, so every key is fetched at most once
//!   per request no matter how many fields ask for it.
//! * [`OneToOne`] and [`OneToMany`]: adapters from persistence queries of the form "all records
//!   where column IN keys", which return records in no particular order, to the positional
//!   contract of [`Fetch`].
//!
//! # Ticks
//!
//! A tick is the span during which all cooperatively scheduled tasks that are currently ready run
//! until they next suspend. When a [`load`](BatchScheduler::load) is issued, the scheduler records
//! the key, then yields to the executor exactly once. Every sibling resolver which is polled in the
//! meantime adds its own key to the same pending batch. When the first of those callers resumes,
//! it dispatches the whole batch.

use crate::key::{FetchKey, InvalidKey};
use async_trait::async_trait;
use snafu::Snafu;

pub mod cache;
pub mod facade;
pub mod scheduler;

pub use cache::Loader;
pub use facade::{OneToMany, OneToOne, Source};
pub use scheduler::BatchScheduler;

/// Errors encountered while loading a key.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoadError {
    /// The key could not be normalized. It was never sent to the batch function.
    #[snafu(display("{source}"), context(false))]
    InvalidKey { source: InvalidKey },
    /// The batch function failed, so every key in the batch failed with it.
    #[snafu(display("error loading {loader}: {message}"))]
    BatchFetch {
        loader: &'static str,
        message: String,
    },
    /// The batch containing this key was dropped before it completed.
    #[snafu(display("batch for {loader} was abandoned before it completed"))]
    Abandoned { loader: &'static str },
}

/// Result of loading a single key. `Ok(None)` means the key does not exist.
pub type LoadResult<V> = Result<Option<V>, LoadError>;

/// A batch function.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    /// The key identifying each value.
    type Key: FetchKey;
    /// The fetched value.
    type Value: Clone + Send + Sync + 'static;
    /// Errors which cause a whole batch to fail.
    type Error: std::error::Error + Send + Sync + 'static;

    /// A human readable name for this batch function, used in logs and errors.
    const NAME: &'static str;

    /// Fetch the values for many keys at once.
    ///
    /// The keys are normalized and distinct. The result must have exactly one entry per key, in
    /// the same order as the keys, with [`None`] for keys that have no value.
    async fn fetch_many(&self, keys: &[Self::Key]) -> Result<Vec<Option<Self::Value>>, Self::Error>;
}
