//! Error taxonomy for the synchronization core.
//!
//! Cache failures never appear here: the key-value cache absorbs them and
//! reports a miss instead. Everything else propagates to the immediate caller
//! of the loader, paginator or fan-out fetcher.

use thiserror::Error;

/// Errors surfaced by the synchronization core.
#[derive(Debug, Error)]
pub enum SyncError {
  /// Transport-level failure (DNS, connection, TLS, timeout)
  #[error("network request failed: {0}")]
  Network(String),

  /// Backend answered with a non-2xx status
  #[error("unexpected status {status} from {path}")]
  Status { status: u16, path: String },

  /// Response body did not match the expected envelope
  #[error("failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),

  /// No cached copy and the network fetch failed
  #[error("{resource} is unavailable: {source}")]
  ResourceUnavailable {
    resource: String,
    #[source]
    source: Box<SyncError>,
  },

  /// A forced refresh failed; any cached copy was left untouched
  #[error("refresh of {resource} failed: {source}")]
  RefreshFailed {
    resource: String,
    #[source]
    source: Box<SyncError>,
  },

  /// Fetching a feed page failed; the cursor is unchanged
  #[error("failed to fetch page {page}: {source}")]
  PageFetch {
    page: u32,
    #[source]
    source: Box<SyncError>,
  },

  /// Fetching one item's auxiliary data failed
  #[error("failed to fetch subresource for {id}: {source}")]
  Subresource {
    id: String,
    #[source]
    source: Box<SyncError>,
  },

  /// A background fetch task died before producing a result
  #[error("fetch task failed: {0}")]
  TaskFailed(String),

  /// The owning session went away before the result arrived
  #[error("request cancelled")]
  Cancelled,
}

impl SyncError {
  /// Whether the caller should offer a retry affordance.
  pub fn is_retryable(&self) -> bool {
    match self {
      SyncError::Network(_) | SyncError::Cancelled => true,
      SyncError::Status { status, .. } => *status == 429 || *status >= 500,
      SyncError::Decode(_) | SyncError::TaskFailed(_) => false,
      SyncError::ResourceUnavailable { source, .. }
      | SyncError::RefreshFailed { source, .. }
      | SyncError::PageFetch { source, .. }
      | SyncError::Subresource { source, .. } => source.is_retryable(),
    }
  }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
