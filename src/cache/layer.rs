//! Resource loader that orchestrates caching logic with network fetching.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;

use super::keys::ResourceKey;
use super::kv::KvCache;
use super::storage::KvStore;
use super::traits::{CacheResult, Freshness};
use crate::error::{Result, SyncError};

/// Cache-first loader for named resources.
///
/// This layer sits between the session and the API client. It never issues a
/// network call when an acceptable cached copy exists, and writes exactly
/// once per successful fetch.
pub struct ResourceLoader<S: KvStore> {
  cache: KvCache<S>,
}

impl<S: KvStore> ResourceLoader<S> {
  /// Create a new loader with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      cache: KvCache::new(storage),
    }
  }

  /// Load a resource.
  ///
  /// 1. Unless forced, return a cached copy accepted by `freshness`
  /// 2. Otherwise fetch from network and store the result
  /// 3. A cached copy past its max age is still served if the refetch fails
  /// 4. A forced refresh that fails is reported, never papered over
  pub async fn load<T, F, Fut>(
    &self,
    key: &ResourceKey,
    freshness: Freshness,
    fetcher: F,
  ) -> Result<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let hash = key.cache_hash();

    let cached = if freshness.force_refresh {
      None
    } else {
      self.read::<T>(key, &hash)
    };

    let aged = match cached {
      Some(hit) if freshness.accepts(age_of(&hit)) => {
        tracing::debug!(resource = %key.description(), "serving from cache");
        return Ok(hit);
      }
      other => other,
    };

    match fetcher().await {
      Ok(data) => {
        self.write(key, &hash, &data);
        Ok(CacheResult::from_network(data))
      }
      Err(e) if freshness.force_refresh => {
        tracing::warn!(resource = %key.description(), error = %e, "forced refresh failed");
        Err(SyncError::RefreshFailed {
          resource: key.description(),
          source: Box::new(e),
        })
      }
      Err(e) => match aged {
        Some(stale) => {
          tracing::warn!(
            resource = %key.description(),
            error = %e,
            "refetch of aged entry failed, serving stale copy"
          );
          let cached_at = stale.cached_at.unwrap_or_else(Utc::now);
          Ok(CacheResult::stale(stale.data, cached_at))
        }
        None => Err(SyncError::ResourceUnavailable {
          resource: key.description(),
          source: Box::new(e),
        }),
      },
    }
  }

  /// Read the cached copy regardless of age, without touching the network.
  pub fn peek<T: DeserializeOwned>(&self, key: &ResourceKey) -> Option<CacheResult<T>> {
    self.read::<T>(key, &key.cache_hash())
  }

  /// Drop the cached copy so the next load goes to the network.
  pub fn invalidate(&self, key: &ResourceKey) -> bool {
    self.cache.remove(&key.cache_hash())
  }

  /// Drop every cached resource (logout).
  pub fn clear(&self) -> bool {
    self.cache.clear()
  }

  fn read<T: DeserializeOwned>(
    &self,
    key: &ResourceKey,
    hash: &str,
  ) -> Option<CacheResult<T>> {
    let entry = self.cache.get(hash)?;
    match serde_json::from_value::<T>(entry.payload) {
      Ok(data) => Some(CacheResult::from_cache(data, entry.written_at)),
      Err(e) => {
        tracing::warn!(
          resource = %key.description(),
          error = %e,
          "cached payload no longer decodes, treating as miss"
        );
        None
      }
    }
  }

  fn write<T: Serialize>(&self, key: &ResourceKey, hash: &str, data: &T) {
    match serde_json::to_value(data) {
      Ok(payload) => {
        self.cache.set(hash, &payload);
      }
      Err(e) => {
        tracing::warn!(resource = %key.description(), error = %e, "payload not cacheable");
      }
    }
  }
}

impl<S: KvStore> Clone for ResourceLoader<S> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
    }
  }
}

fn age_of<T>(result: &CacheResult<T>) -> Duration {
  result
    .cached_at
    .and_then(|at| (Utc::now() - at).to_std().ok())
    .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStore;
  use crate::cache::traits::CacheSource;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  /// Counts writes so tests can assert "exactly one write per fetch".
  #[derive(Default)]
  struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
  }

  impl KvStore for Arc<CountingStore> {
    fn get(&self, key: &str) -> color_eyre::Result<Option<String>> {
      self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> color_eyre::Result<()> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> color_eyre::Result<()> {
      self.inner.remove(key)
    }

    fn clear(&self) -> color_eyre::Result<()> {
      self.inner.clear()
    }
  }

  fn counting_loader() -> (ResourceLoader<Arc<CountingStore>>, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::default());
    (ResourceLoader::new(Arc::clone(&store)), store)
  }

  fn key() -> ResourceKey {
    ResourceKey::posting("7")
  }

  #[tokio::test]
  async fn test_second_cache_first_load_skips_fetcher() {
    let (loader, store) = counting_loader();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let result = loader
        .load(&key(), Freshness::cache_first(), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok::<_, SyncError>(vec![1, 2, 3])
        })
        .await
        .unwrap();
      assert_eq!(result.data, vec![1, 2, 3]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_cache_hit_reports_source() {
    let (loader, _) = counting_loader();
    let first = loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(1u32) })
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert!(first.cached_at.is_none());

    let second = loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(2u32) })
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, 1);
    assert!(second.cached_at.is_some());
  }

  #[tokio::test]
  async fn test_force_refresh_fetches_and_overwrites() {
    let (loader, store) = counting_loader();
    loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(1u32) })
      .await
      .unwrap();

    let forced = loader
      .load(&key(), Freshness::force(), || async { Ok::<_, SyncError>(2u32) })
      .await
      .unwrap();
    assert_eq!(forced.data, 2);
    assert_eq!(forced.source, CacheSource::Network);
    assert_eq!(store.writes.load(Ordering::SeqCst), 2);

    let peeked: CacheResult<u32> = loader.peek(&key()).unwrap();
    assert_eq!(peeked.data, 2);
  }

  #[tokio::test]
  async fn test_missing_entry_and_failed_fetch_is_unavailable() {
    let (loader, store) = counting_loader();
    let err = loader
      .load::<u32, _, _>(&key(), Freshness::cache_first(), || async {
        Err(SyncError::Network("offline".to_string()))
      })
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::ResourceUnavailable { .. }));
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_failed_forced_refresh_is_reported_and_keeps_old_value() {
    let (loader, _) = counting_loader();
    loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(1u32) })
      .await
      .unwrap();

    let err = loader
      .load::<u32, _, _>(&key(), Freshness::force(), || async {
        Err(SyncError::Network("offline".to_string()))
      })
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::RefreshFailed { .. }));

    // Old data is still there for the caller to show if it wants to
    let old: CacheResult<u32> = loader.peek(&key()).unwrap();
    assert_eq!(old.data, 1);
  }

  #[tokio::test]
  async fn test_aged_entry_refetches_and_falls_back_to_stale() {
    let (loader, _) = counting_loader();
    loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(1u32) })
      .await
      .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let aged = Freshness::max_age(Duration::from_millis(1));

    let refreshed = loader
      .load(&key(), aged, || async { Ok::<_, SyncError>(2u32) })
      .await
      .unwrap();
    assert_eq!(refreshed.source, CacheSource::Network);
    assert_eq!(refreshed.data, 2);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let stale = loader
      .load::<u32, _, _>(&key(), aged, || async {
        Err(SyncError::Network("offline".to_string()))
      })
      .await
      .unwrap();
    assert_eq!(stale.source, CacheSource::Stale);
    assert_eq!(stale.data, 2);
  }

  #[tokio::test]
  async fn test_undecodable_cached_payload_is_a_miss() {
    let (loader, _) = counting_loader();
    loader
      .load(&key(), Freshness::cache_first(), || async {
        Ok::<_, SyncError>("not a number".to_string())
      })
      .await
      .unwrap();

    let result = loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(5u32) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, 5);
  }

  #[tokio::test]
  async fn test_invalidate_forces_next_fetch() {
    let (loader, _) = counting_loader();
    loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(1u32) })
      .await
      .unwrap();

    assert!(loader.invalidate(&key()));
    assert!(loader.peek::<u32>(&key()).is_none());

    let result = loader
      .load(&key(), Freshness::cache_first(), || async { Ok::<_, SyncError>(3u32) })
      .await
      .unwrap();
    assert_eq!(result.data, 3);
  }
}
