//! Cache-first loading of named resources.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Persists JSON payloads in a durable key-value store
//! - Treats every storage failure as a miss (the network is always the fallback)
//! - Serves cached copies without a network call unless the caller asks for fresher data
//! - Writes exactly once per successful fetch

mod keys;
mod kv;
mod layer;
mod storage;
mod traits;

pub use keys::ResourceKey;
pub use kv::KvCache;
pub use layer::ResourceLoader;
pub use storage::{KvStore, MemoryStore, NoopStore, SqliteStore};
pub use traits::{CacheEntry, CacheResult, CacheSource, Freshness};
