//! Data synchronization core for a farm job board.
//!
//! The pieces, bottom-up:
//! - [`cache`]: fail-open key-value cache and the cache-first [`cache::ResourceLoader`]
//! - [`api`]: the transport seam and a typed client for the job board backend
//! - [`feed`]: the paginated master collection and the filtered view over it
//! - [`fanout`]: concurrent per-posting fetches such as applicant counts
//! - [`refresh`]: scoped cross-screen refresh notifications
//! - [`session`]: one feed screen's lifecycle tying the above together

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fanout;
pub mod feed;
pub mod logging;
pub mod refresh;
pub mod session;

pub use error::{Result, SyncError};
