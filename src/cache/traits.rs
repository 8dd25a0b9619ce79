//! Core types for the caching system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named blob as persisted in the key-value store.
///
/// Freshness is not a property of the entry: `written_at` is recorded, but
/// whether that is too old is decided by the caller through [`Freshness`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub key: String,
  pub payload: serde_json::Value,
  pub written_at: DateTime<Utc>,
}

impl CacheEntry {
  /// Age of the entry relative to `now`. Future timestamps count as zero.
  pub fn age(&self, now: DateTime<Utc>) -> Duration {
    (now - self.written_at).to_std().unwrap_or(Duration::ZERO)
  }
}

/// Staleness tolerance for a single load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Freshness {
  /// Cached entries older than this are refetched. `None` accepts any age.
  pub max_age: Option<Duration>,
  /// Skip the cache entirely and report fetch failures.
  pub force_refresh: bool,
}

impl Freshness {
  /// Strict cache-first: any cached copy is good enough.
  pub fn cache_first() -> Self {
    Self::default()
  }

  /// Bypass the cache.
  pub fn force() -> Self {
    Self {
      max_age: None,
      force_refresh: true,
    }
  }

  /// Accept cached copies up to `max_age` old.
  pub fn max_age(max_age: Duration) -> Self {
    Self {
      max_age: Some(max_age),
      force_refresh: false,
    }
  }

  /// Same tolerance, forced when `force` is set.
  pub fn forced_if(self, force: bool) -> Self {
    Self {
      force_refresh: self.force_refresh || force,
      ..self
    }
  }

  /// Whether an entry of the given age may be served without a fetch.
  pub fn accepts(&self, age: Duration) -> bool {
    if self.force_refresh {
      return false;
    }
    self.max_age.map_or(true, |max| age <= max)
  }
}

/// Result from a load, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Cached data served because a refetch of an aged entry failed.
  pub fn stale(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Stale,
      cached_at: Some(cached_at),
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
    }
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, accepted by the caller's freshness policy
  Cache,
  /// Data from cache past its max age; the refetch failed
  Stale,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_first_accepts_any_age() {
    let freshness = Freshness::cache_first();
    assert!(freshness.accepts(Duration::ZERO));
    assert!(freshness.accepts(Duration::from_secs(60 * 60 * 24 * 365)));
  }

  #[test]
  fn test_force_accepts_nothing() {
    assert!(!Freshness::force().accepts(Duration::ZERO));
    assert!(!Freshness::max_age(Duration::from_secs(60))
      .forced_if(true)
      .accepts(Duration::ZERO));
  }

  #[test]
  fn test_max_age_boundary() {
    let freshness = Freshness::max_age(Duration::from_secs(60));
    assert!(freshness.accepts(Duration::from_secs(60)));
    assert!(!freshness.accepts(Duration::from_secs(61)));
  }

  #[test]
  fn test_entry_age_clamps_future_timestamps() {
    let now = Utc::now();
    let entry = CacheEntry {
      key: "k".to_string(),
      payload: serde_json::Value::Null,
      written_at: now + chrono::Duration::seconds(30),
    };
    assert_eq!(entry.age(now), Duration::ZERO);
  }
}
