//! Coalescing of individual loads into batched fetches.

use super::{AbandonedSnafu, Fetch, LoadError, LoadResult};
use crate::key::FetchKey;
use async_std::{sync::Mutex, task};
use futures::channel::oneshot;
use indexmap::IndexMap;
use std::sync::Arc;

type Reply<V> = oneshot::Sender<LoadResult<V>>;

/// Collects the keys requested during a tick and dispatches them as one batch.
///
/// Cloning a scheduler yields a handle to the same pending batches.
pub struct BatchScheduler<F: Fetch> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetch> Clone for BatchScheduler<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<F: Fetch> {
    fetch: F,
    max_batch_size: Option<usize>,
    state: Mutex<State<F>>,
}

struct State<F: Fetch> {
    next_tick: u64,
    // The batch which new keys are added to.
    accumulating: Option<DispatchQueue<F>>,
    // Batches which reached the maximum size and are waiting for one of their callers to resume.
    closed: Vec<DispatchQueue<F>>,
}

struct DispatchQueue<F: Fetch> {
    tick: u64,
    requests: IndexMap<F::Key, Vec<Reply<F::Value>>>,
}

impl<F: Fetch> DispatchQueue<F> {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            requests: Default::default(),
        }
    }
}

impl<F: Fetch> BatchScheduler<F> {
    /// A scheduler which sends every key requested during a tick in a single batch.
    pub fn new(fetch: F) -> Self {
        Self::build(fetch, None)
    }

    /// A scheduler which splits batches so that no call to the batch function has more than
    /// `max_batch_size` keys.
    pub fn with_max_batch_size(fetch: F, max_batch_size: usize) -> Self {
        Self::build(fetch, Some(max_batch_size.max(1)))
    }

    fn build(fetch: F, max_batch_size: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetch,
                max_batch_size,
                state: Mutex::new(State {
                    next_tick: 0,
                    accumulating: None,
                    closed: vec![],
                }),
            }),
        }
    }

    /// Load the value for a single key.
    ///
    /// The key is added to the pending batch, and the value is available once the batch has been
    /// dispatched and the batch function has returned. Every load of the same key within the same
    /// batch resolves to the same result. An invalid key fails without joining any batch.
    pub async fn load(&self, key: F::Key) -> LoadResult<F::Value> {
        let key = key.normalize()?;
        let (tick, reply) = self.enqueue(key).await;

        // Give every sibling resolver that is ready in this tick a chance to add its own key.
        task::yield_now().await;
        self.dispatch(tick).await;

        reply.await.unwrap_or_else(|_| Err(Self::abandoned()))
    }

    /// The error seen by callers whose batch was dropped before it completed.
    pub(super) fn abandoned() -> LoadError {
        AbandonedSnafu { loader: F::NAME }.build()
    }

    /// Load many keys, returning one result per key in the order the keys were given.
    pub async fn load_many(
        &self,
        keys: impl IntoIterator<Item = F::Key>,
    ) -> Vec<LoadResult<F::Value>> {
        futures::future::join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Add a normalized key to the pending batch.
    ///
    /// Returns the tick of the batch the key joined, and a receiver for its result. The result
    /// arrives only after some caller [dispatches](Self::dispatch) that tick.
    pub(super) async fn enqueue(
        &self,
        key: F::Key,
    ) -> (u64, oneshot::Receiver<LoadResult<F::Value>>) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.state.lock().await;
        let State {
            next_tick,
            accumulating,
            closed,
        } = &mut *state;

        // A key which is already waiting in a full batch joins that batch.
        if let Some(queue) = closed.iter_mut().find(|q| q.requests.contains_key(&key)) {
            queue.requests[&key].push(tx);
            return (queue.tick, rx);
        }

        let full = match (accumulating.as_ref(), self.inner.max_batch_size) {
            (Some(queue), Some(max)) => {
                queue.requests.len() >= max && !queue.requests.contains_key(&key)
            }
            _ => false,
        };
        if full {
            closed.extend(accumulating.take());
        }

        let queue = accumulating.get_or_insert_with(|| {
            *next_tick += 1;
            DispatchQueue::new(*next_tick)
        });
        queue.requests.entry(key).or_default().push(tx);
        (queue.tick, rx)
    }

    /// Send the batch for `tick` to the batch function, unless it has already been sent.
    pub(super) async fn dispatch(&self, tick: u64) {
        let queue = {
            let mut state = self.inner.state.lock().await;
            if state.accumulating.as_ref().map(|q| q.tick) == Some(tick) {
                state.accumulating.take()
            } else {
                state
                    .closed
                    .iter()
                    .position(|q| q.tick == tick)
                    .map(|i| state.closed.remove(i))
            }
        };
        // If the batch is gone, another caller from the same tick has already dispatched it.
        if let Some(queue) = queue {
            self.settle(queue).await;
        }
    }

    async fn settle(&self, DispatchQueue { tick, requests }: DispatchQueue<F>) {
        let (keys, waiters): (Vec<_>, Vec<_>) = requests.into_iter().unzip();
        tracing::debug!(loader = F::NAME, tick, keys = keys.len(), "dispatching batch");

        let results: Vec<LoadResult<F::Value>> = match self.inner.fetch.fetch_many(&keys).await {
            Ok(values) if values.len() == keys.len() => values.into_iter().map(Ok).collect(),
            Ok(values) => {
                let message = format!(
                    "batch function returned {} values for {} keys",
                    values.len(),
                    keys.len()
                );
                tracing::warn!(loader = F::NAME, tick, "{message}");
                vec![super::BatchFetchSnafu { loader: F::NAME, message }.fail(); keys.len()]
            }
            Err(err) => {
                tracing::warn!(loader = F::NAME, tick, "batch failed: {err}");
                let message = err.to_string();
                vec![super::BatchFetchSnafu { loader: F::NAME, message }.fail(); keys.len()]
            }
        };

        for (waiters, result) in waiters.into_iter().zip(results) {
            for tx in waiters {
                // The caller may have been cancelled, in which case nobody wants the result.
                tx.send(result.clone()).ok();
            }
        }
    }
}
