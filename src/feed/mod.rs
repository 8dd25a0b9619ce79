//! The feed: a paginated master collection and the filtered view over it.

mod filter;
mod paginator;

use chrono::{DateTime, Utc};

pub use filter::{available_payment_types, available_states, derive, FilterLayer, FilterState};
pub use paginator::{PageOutcome, PageTicket, PaginationCursor, Paginator};

/// Anything the feed can order newest first
pub trait Chronological {
  fn created_at(&self) -> DateTime<Utc>;
}
