//! Fail-open JSON cache over a [`KvStore`].

use chrono::Utc;
use std::sync::Arc;

use super::storage::KvStore;
use super::traits::CacheEntry;

/// Typed view over a key-value backend.
///
/// Every backend error is logged and reported as a miss (reads) or `false`
/// (writes).
pub struct KvCache<S: KvStore> {
  store: Arc<S>,
}

impl<S: KvStore> KvCache<S> {
  pub fn new(store: S) -> Self {
    Self {
      store: Arc::new(store),
    }
  }

  pub fn from_shared(store: Arc<S>) -> Self {
    Self { store }
  }

  /// Read an entry. Missing, unreadable and undecodable entries are all `None`.
  pub fn get(&self, key: &str) -> Option<CacheEntry> {
    let raw = match self.store.get(key) {
      Ok(Some(raw)) => raw,
      Ok(None) => {
        tracing::debug!(key = %key, "cache miss");
        return None;
      }
      Err(e) => {
        tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
        return None;
      }
    };

    match serde_json::from_str::<CacheEntry>(&raw) {
      Ok(entry) => {
        tracing::debug!(key = %key, written_at = %entry.written_at, "cache hit");
        Some(entry)
      }
      Err(e) => {
        tracing::warn!(key = %key, error = %e, "cache entry undecodable, treating as miss");
        None
      }
    }
  }

  /// Write `payload` under `key`, stamping it with the current time.
  pub fn set(&self, key: &str, payload: &serde_json::Value) -> bool {
    let entry = CacheEntry {
      key: key.to_string(),
      payload: payload.clone(),
      written_at: Utc::now(),
    };

    let raw = match serde_json::to_string(&entry) {
      Ok(raw) => raw,
      Err(e) => {
        tracing::warn!(key = %key, error = %e, "cache entry not serializable");
        return false;
      }
    };

    match self.store.set(key, &raw) {
      Ok(()) => {
        tracing::debug!(key = %key, "cache write");
        true
      }
      Err(e) => {
        tracing::warn!(key = %key, error = %e, "cache write failed");
        false
      }
    }
  }

  pub fn remove(&self, key: &str) -> bool {
    match self.store.remove(key) {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(key = %key, error = %e, "cache remove failed");
        false
      }
    }
  }

  /// Drop every entry, e.g. on logout.
  pub fn clear(&self) -> bool {
    match self.store.clear() {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(error = %e, "cache clear failed");
        false
      }
    }
  }
}

impl<S: KvStore> Clone for KvCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}
