//! Page-at-a-time loading of the master collection.

use std::cmp::Reverse;
use std::future::Future;
use std::time::Duration;

use super::Chronological;
use crate::error::{Result, SyncError};

const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Where the feed is in its page sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
  /// Next page to request, 1-based
  pub page_number: u32,
  /// The source returned an empty page; no further fetches
  pub exhausted: bool,
  /// A page fetch is in flight
  pub loading: bool,
}

impl Default for PaginationCursor {
  fn default() -> Self {
    Self {
      page_number: 1,
      exhausted: false,
      loading: false,
    }
  }
}

/// Permission to fetch one page, handed out by [`Paginator::begin`].
///
/// Tickets issued before a [`Paginator::reset`] are stale and their results
/// are dropped. [`Paginator::finish`] consumes the ticket, so one page can
/// only be applied once:
///
/// ```compile_fail
/// use fieldwork::api::Posting;
/// use fieldwork::feed::Paginator;
///
/// let mut paginator: Paginator<Posting> = Paginator::new();
/// let ticket = paginator.begin().unwrap();
/// let _ = paginator.finish(ticket, Ok(Vec::new()));
/// let _ = paginator.finish(ticket, Ok(Vec::new()));
/// ```
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a ticket keeps the paginator loading until it is finished"]
pub struct PageTicket {
  page: u32,
  generation: u64,
}

impl PageTicket {
  pub fn page(&self) -> u32 {
    self.page
  }
}

/// What a page request did to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
  /// Items were merged and the cursor advanced
  Appended(usize),
  /// The page was empty; the paginator is now terminal
  Exhausted,
  /// Already loading or exhausted, nothing was fetched
  Skipped,
  /// Result belonged to a session that has since been reset
  Discarded,
}

/// Owns the master collection and the cursor that grows it.
#[derive(Debug)]
pub struct Paginator<T> {
  cursor: PaginationCursor,
  items: Vec<T>,
  generation: u64,
  consecutive_failures: u32,
}

impl<T> Default for Paginator<T> {
  fn default() -> Self {
    Self {
      cursor: PaginationCursor::default(),
      items: Vec::new(),
      generation: 0,
      consecutive_failures: 0,
    }
  }
}

impl<T: Chronological> Paginator<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed a collection. Items are sorted newest first.
  pub fn from_items(items: Vec<T>) -> Self {
    let mut paginator = Self {
      items,
      ..Self::default()
    };
    paginator.sort();
    paginator
  }

  pub fn cursor(&self) -> PaginationCursor {
    self.cursor
  }

  /// The master collection, newest first
  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn consecutive_failures(&self) -> u32 {
    self.consecutive_failures
  }

  /// Suggested wait before retrying after repeated failures.
  ///
  /// `None` until a fetch has failed, then 1s doubling per consecutive
  /// failure up to 30s.
  pub fn retry_delay(&self) -> Option<Duration> {
    if self.consecutive_failures == 0 {
      return None;
    }
    let exponent = (self.consecutive_failures - 1).min(5);
    Some((BASE_RETRY_DELAY * 2u32.pow(exponent)).min(MAX_RETRY_DELAY))
  }

  /// Claim the next page. `None` while a page is in flight or once exhausted.
  pub fn begin(&mut self) -> Option<PageTicket> {
    if self.cursor.loading || self.cursor.exhausted {
      return None;
    }
    self.cursor.loading = true;
    Some(PageTicket {
      page: self.cursor.page_number,
      generation: self.generation,
    })
  }

  /// Apply the result of a page fetch started with [`begin`](Self::begin).
  pub fn finish(&mut self, ticket: PageTicket, result: Result<Vec<T>>) -> Result<PageOutcome> {
    if ticket.generation != self.generation {
      tracing::debug!(page = ticket.page, "dropping page result from a reset session");
      return Ok(PageOutcome::Discarded);
    }

    self.cursor.loading = false;

    let page = match result {
      Ok(page) => page,
      Err(e) => {
        self.consecutive_failures += 1;
        tracing::warn!(
          page = ticket.page,
          failures = self.consecutive_failures,
          error = %e,
          "page fetch failed"
        );
        return Err(SyncError::PageFetch {
          page: ticket.page,
          source: Box::new(e),
        });
      }
    };

    self.consecutive_failures = 0;

    if page.is_empty() {
      self.cursor.exhausted = true;
      tracing::debug!(page = ticket.page, "feed exhausted");
      return Ok(PageOutcome::Exhausted);
    }

    let count = page.len();
    self.items.extend(page);
    self.sort();
    self.cursor.page_number += 1;
    tracing::debug!(page = ticket.page, count, total = self.items.len(), "page appended");

    Ok(PageOutcome::Appended(count))
  }

  /// Fetch the next page through `fetch` unless loading or exhausted.
  pub async fn request_next_page<F, Fut>(&mut self, fetch: F) -> Result<PageOutcome>
  where
    F: FnOnce(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let Some(ticket) = self.begin() else {
      return Ok(PageOutcome::Skipped);
    };
    let result = fetch(ticket.page).await;
    self.finish(ticket, result)
  }

  /// Back to page 1 with an empty collection. Outstanding tickets go stale.
  pub fn reset(&mut self) {
    self.cursor = PaginationCursor::default();
    self.items.clear();
    self.consecutive_failures = 0;
    self.generation += 1;
  }

  // Stable, so equal timestamps keep arrival order
  fn sort(&mut self) {
    self.items.sort_by_key(|item| Reverse(item.created_at()));
  }
}
