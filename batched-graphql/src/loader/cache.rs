//! Per-request memoization of loads.

use super::{BatchScheduler, Fetch, LoadResult};
use crate::key::{FetchKey, InvalidKey};
use async_std::{sync::Mutex, task};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::{hash_map::Entry, HashMap};

type Pending<V> = Shared<BoxFuture<'static, LoadResult<V>>>;

struct Cached<V> {
    // The tick of the batch which will produce the result, or `None` for primed values.
    tick: Option<u64>,
    result: Pending<V>,
}

/// A batching loader with a cache of every result it has produced.
///
/// A loader lives for exactly one request. Within that request, each normalized key is fetched from
/// the batch function at most once: later loads of the same key resolve from the cache, even while
/// the first fetch for that key is still in flight. Failures are cached along with values, so a key
/// whose batch failed is not retried for the rest of the request.
///
/// Entries only change when the owner of the loader says so, through [`replace`](Self::replace),
/// [`clear`](Self::clear) or [`clear_all`](Self::clear_all). Code that writes to the data behind a
/// loader uses these to keep later loads in the same request consistent with the write.
pub struct Loader<F: Fetch> {
    scheduler: BatchScheduler<F>,
    cache: Mutex<HashMap<F::Key, Cached<F::Value>>>,
}

impl<F: Fetch> Loader<F> {
    pub fn new(fetch: F) -> Self {
        Self::with_scheduler(BatchScheduler::new(fetch))
    }

    pub fn with_scheduler(scheduler: BatchScheduler<F>) -> Self {
        Self {
            scheduler,
            cache: Default::default(),
        }
    }

    /// Load the value for `key`, fetching it only if it has not been requested before.
    pub async fn load(&self, key: F::Key) -> LoadResult<F::Value> {
        let key = key.normalize()?;
        let (tick, result) = {
            let mut cache = self.cache.lock().await;
            match cache.entry(key) {
                Entry::Occupied(e) => (e.get().tick, e.get().result.clone()),
                Entry::Vacant(e) => {
                    let (tick, reply) = self.scheduler.enqueue(e.key().clone()).await;
                    let result = reply
                        .map(|reply| reply.unwrap_or_else(|_| Err(BatchScheduler::<F>::abandoned())))
                        .boxed()
                        .shared();
                    e.insert(Cached {
                        tick: Some(tick),
                        result: result.clone(),
                    });
                    (Some(tick), result)
                }
            }
        };

        // Every caller waiting on an unsettled batch helps dispatch it, so the batch is sent even
        // if the caller which first requested the key goes away.
        if let (Some(tick), None) = (tick, result.peek()) {
            task::yield_now().await;
            self.scheduler.dispatch(tick).await;
        }
        result.await
    }

    /// Load many keys, returning one result per key in the order the keys were given.
    pub async fn load_many(
        &self,
        keys: impl IntoIterator<Item = F::Key>,
    ) -> Vec<LoadResult<F::Value>> {
        future::join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Seed the cache with a value obtained some other way.
    ///
    /// If `key` is already cached, the cached entry is kept.
    pub async fn prime(&self, key: F::Key, value: F::Value) -> Result<(), InvalidKey> {
        let key = key.normalize()?;
        self.cache
            .lock()
            .await
            .entry(key)
            .or_insert_with(|| Cached::ready(value));
        Ok(())
    }

    /// Seed the cache with many records, each stored under the key `key_of` extracts from it.
    pub async fn prime_many<I>(
        &self,
        values: I,
        key_of: impl Fn(&F::Value) -> F::Key,
    ) -> Result<(), InvalidKey>
    where
        I: IntoIterator<Item = F::Value>,
    {
        for value in values {
            self.prime(key_of(&value), value).await?;
        }
        Ok(())
    }

    /// Cache `value` for `key`, discarding whatever was cached before.
    pub async fn replace(&self, key: F::Key, value: F::Value) -> Result<(), InvalidKey> {
        let key = key.normalize()?;
        self.cache.lock().await.insert(key, Cached::ready(value));
        Ok(())
    }

    /// Forget the cached result for `key`, so that the next load fetches it again.
    ///
    /// Loads already waiting on the forgotten entry still receive its result.
    pub async fn clear(&self, key: F::Key) -> Result<(), InvalidKey> {
        let key = key.normalize()?;
        if self.cache.lock().await.remove(&key).is_some() {
            tracing::debug!(loader = F::NAME, ?key, "cleared cache entry");
        }
        Ok(())
    }

    /// Forget every cached result.
    pub async fn clear_all(&self) {
        let mut cache = self.cache.lock().await;
        tracing::debug!(loader = F::NAME, entries = cache.len(), "cleared cache");
        cache.clear();
    }
}

impl<V: Clone + Send + Sync + 'static> Cached<V> {
    fn ready(value: V) -> Self {
        Self {
            tick: None,
            result: future::ready(Ok(Some(value))).boxed().shared(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        init_logging,
        loader::{test_fetch::*, LoadError},
    };
    use futures::join;

    #[async_std::test]
    async fn test_cache_hit_across_ticks() {
        init_logging();

        let fetch = Times10::default();
        let loader = Loader::new(fetch.clone());
        assert_eq!(loader.load(1).await, Ok(Some(10)));
        assert_eq!(loader.load_many([1, 2]).await, [Ok(Some(10)), Ok(Some(20))]);
        assert_eq!(loader.load(2).await, Ok(Some(20)));
        assert_eq!(fetch.calls().await, [vec![1], vec![2]]);
    }

    #[async_std::test]
    async fn test_in_flight_dedupe() {
        init_logging();

        let fetch = Times10::default();
        let loader = Loader::new(fetch.clone());
        let (a, b, c) = join!(loader.load(7), loader.load(7), loader.load(8));
        assert_eq!((a, b, c), (Ok(Some(70)), Ok(Some(70)), Ok(Some(80))));
        assert_eq!(fetch.calls().await, [vec![7, 8]]);
    }

    #[async_std::test]
    async fn test_prime() {
        init_logging();

        let fetch = Times10::default();
        let loader = Loader::new(fetch.clone());
        loader.prime(3, 333).await.unwrap();
        assert_eq!(loader.load(3).await, Ok(Some(333)));

        // Priming never overwrites a cached entry.
        assert_eq!(loader.load(4).await, Ok(Some(40)));
        loader.prime(4, 444).await.unwrap();
        assert_eq!(loader.load(4).await, Ok(Some(40)));

        loader.prime_many([50, 60], |v| v / 10).await.unwrap();
        assert_eq!(loader.load_many([5, 6]).await, [Ok(Some(50)), Ok(Some(60))]);

        assert_eq!(fetch.calls().await, [vec![4]]);
    }

    #[async_std::test]
    async fn test_failure_cached() {
        init_logging();

        let fetch = Times10::failing("unavailable");
        let loader = Loader::new(fetch.clone());
        let expected = Err(LoadError::BatchFetch {
            loader: "times_10",
            message: "unavailable".into(),
        });
        assert_eq!(loader.load(1).await, expected);
        assert_eq!(loader.load(1).await, expected);
        assert_eq!(fetch.calls().await.len(), 1);
    }

    #[async_std::test]
    async fn test_bounded_batches() {
        init_logging();

        let fetch = Times10::default();
        let loader = Loader::with_scheduler(BatchScheduler::with_max_batch_size(fetch.clone(), 3));
        let results = loader.load_many([1, 2, 3, 4, 2]).await;
        assert_eq!(
            results,
            [10, 20, 30, 40, 20].map(|v| Ok::<_, LoadError>(Some(v)))
        );

        let mut calls = fetch.calls().await;
        calls.sort();
        assert_eq!(calls, [vec![1, 2, 3], vec![4]]);
    }

    #[async_std::test]
    async fn test_loaders_do_not_share_cache() {
        init_logging();

        let fetch = Times10::default();
        let first = Loader::new(fetch.clone());
        let second = Loader::new(fetch.clone());
        first.load(1).await.unwrap();
        second.load(1).await.unwrap();
        assert_eq!(fetch.calls().await, [vec![1], vec![1]]);
    }

    #[async_std::test]
    async fn test_replace_and_clear() {
        init_logging();

        let fetch = Times10::default();
        let loader = Loader::new(fetch.clone());
        assert_eq!(loader.load_many([1, 2]).await, [Ok(Some(10)), Ok(Some(20))]);

        loader.replace(1, 11).await.unwrap();
        assert_eq!(loader.load(1).await, Ok(Some(11)));

        // A cleared key is fetched again; its neighbours stay cached.
        loader.clear(1).await.unwrap();
        assert_eq!(loader.load(1).await, Ok(Some(10)));
        assert_eq!(loader.load(2).await, Ok(Some(20)));
        assert_eq!(fetch.calls().await, [vec![1, 2], vec![1]]);

        loader.clear_all().await;
        assert_eq!(loader.load_many([2, 1]).await, [Ok(Some(20)), Ok(Some(10))]);
        assert_eq!(fetch.calls().await, [vec![1, 2], vec![1], vec![2, 1]]);
    }

    #[async_std::test]
    async fn test_cleared_failure_is_fetched_again() {
        init_logging();

        let fetch = Times10::failing("unavailable");
        let loader = Loader::new(fetch.clone());
        assert!(loader.load(1).await.is_err());
        loader.clear(1).await.unwrap();
        assert!(loader.load(1).await.is_err());
        assert_eq!(fetch.calls().await, [vec![1], vec![1]]);
    }

    #[async_std::test]
    async fn test_invalid_keys_rejected_by_cache_updates() {
        init_logging();

        let loader = Loader::new(Evens);
        assert_eq!(loader.prime(Even(1), 1).await, Err(InvalidKey::new(1, "odd")));
        assert_eq!(loader.replace(Even(3), 3).await, Err(InvalidKey::new(3, "odd")));
        assert_eq!(loader.clear(Even(5)).await, Err(InvalidKey::new(5, "odd")));
        assert_eq!(
            loader.prime_many([2, 7, 4], |v| Even(*v)).await,
            Err(InvalidKey::new(7, "odd"))
        );
        // Values before the invalid one were primed.
        assert_eq!(loader.load(Even(2)).await, Ok(Some(2)));
    }

    #[async_std::test]
    async fn test_failing_loader_in_same_tick() {
        init_logging();

        let good = Times10::default();
        let bad = Times10::failing("down");
        let good_loader = Loader::new(good.clone());
        let bad_loader = Loader::new(bad.clone());

        let (a, b, c, d) = join!(
            good_loader.load(1),
            bad_loader.load(1),
            good_loader.load(2),
            bad_loader.load(2)
        );
        let failed = Err(LoadError::BatchFetch {
            loader: "times_10",
            message: "down".into(),
        });
        assert_eq!(a, Ok(Some(10)));
        assert_eq!(c, Ok(Some(20)));
        assert_eq!(b, failed);
        assert_eq!(d, failed);

        // Both batches were dispatched together, one per loader.
        assert_eq!(good.calls().await, [vec![1, 2]]);
        assert_eq!(bad.calls().await, [vec![1, 2]]);
    }
}
