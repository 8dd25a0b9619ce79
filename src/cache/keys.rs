//! Named resources and their storage keys.

use sha2::{Digest, Sha256};

/// Resources the loader knows how to cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKey {
  /// One page of the postings feed
  PostingsPage { page: u32, page_size: u32 },
  /// A single posting, as shown in the detail view
  Posting { id: String },
}

impl ResourceKey {
  pub fn postings_page(page: u32, page_size: u32) -> Self {
    Self::PostingsPage { page, page_size }
  }

  pub fn posting(id: impl Into<String>) -> Self {
    Self::Posting { id: id.into() }
  }

  /// Stable, fixed-length key for the backing store.
  pub fn cache_hash(&self) -> String {
    let input = match self {
      Self::PostingsPage { page, page_size } => format!("postings_page:{}:{}", page, page_size),
      Self::Posting { id } => format!("posting:{}", normalize_id(id)),
    };

    hex::encode(Sha256::digest(input.as_bytes()))
  }

  /// Human-readable name for logs and errors.
  pub fn description(&self) -> String {
    match self {
      Self::PostingsPage { page, .. } => format!("postings page {}", page),
      Self::Posting { id } => format!("posting {}", id),
    }
  }
}

fn normalize_id(id: &str) -> &str {
  id.trim()
}
