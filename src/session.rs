//! One feed screen's lifetime: `Inactive → Loading → Ready`.
//!
//! Activation is the single place where the feed resets itself. Pending
//! refresh notifications are consumed there, page 1 is loaded through the
//! cache, and later pages come straight from the network.

use std::time::Duration;

use crate::api::{ApiClient, Posting, Transport};
use crate::cache::{CacheResult, CacheSource, Freshness, KvStore, ResourceKey, ResourceLoader};
use crate::error::{Result, SyncError};
use crate::fanout::{FanoutFetcher, SubresourceStatus};
use crate::feed::{derive, FilterState, PageOutcome, PaginationCursor, Paginator};
use crate::refresh::{RefreshCoordinator, RefreshScope, RefreshSubscription};

/// Lifecycle of a feed screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Inactive,
  Loading,
  Ready,
}

/// Tunables for a feed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
  pub page_size: u32,
  /// Cached page 1 older than this is refetched. `None` accepts any age.
  pub max_age: Option<Duration>,
}

impl Default for SessionOptions {
  fn default() -> Self {
    Self {
      page_size: 20,
      max_age: None,
    }
  }
}

/// Feed screen session.
///
/// Owns the master collection, filter state and applicant counts for one
/// screen. Dropping the session aborts its in-flight fetches.
pub struct FeedSession<T: Transport, S: KvStore> {
  api: ApiClient<T>,
  loader: ResourceLoader<S>,
  coordinator: RefreshCoordinator,
  subscription: RefreshSubscription,
  options: SessionOptions,
  state: SessionState,
  paginator: Paginator<Posting>,
  filters: FilterState,
  applicants: FanoutFetcher<u64>,
  first_page_source: Option<CacheSource>,
  last_error: Option<SyncError>,
}

impl<T: Transport, S: KvStore> FeedSession<T, S> {
  pub fn new(
    api: ApiClient<T>,
    loader: ResourceLoader<S>,
    coordinator: RefreshCoordinator,
    options: SessionOptions,
  ) -> Self {
    let subscription =
      coordinator.subscribe(&[RefreshScope::Postings, RefreshScope::Applications]);
    Self {
      api,
      loader,
      coordinator,
      subscription,
      options,
      state: SessionState::Inactive,
      paginator: Paginator::new(),
      filters: FilterState::default(),
      applicants: FanoutFetcher::new(),
      first_page_source: None,
      last_error: None,
    }
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  /// Screen gained focus.
  ///
  /// Resets the feed, honors pending refresh notifications and loads page 1.
  pub async fn activate(&mut self) -> Result<PageOutcome> {
    self.paginator.reset();
    self.first_page_source = None;
    self.last_error = None;
    self.state = SessionState::Loading;

    let force = self.subscription.take(RefreshScope::Postings);
    if self.subscription.take(RefreshScope::Applications) {
      self.applicants.clear();
    }
    tracing::debug!(force, "activating feed session");

    let outcome = self.load_first_page(force).await;
    self.state = SessionState::Ready;
    outcome
  }

  /// Screen lost focus. In-flight work is abandoned and filters are cleared.
  pub fn deactivate(&mut self) {
    self.applicants.cancel();
    self.paginator.reset();
    self.filters.clear();
    self.state = SessionState::Inactive;
  }

  /// Explicit pull-to-refresh: page 1 from the network, cache rewritten.
  pub async fn refresh(&mut self) -> Result<PageOutcome> {
    self.paginator.reset();
    self.last_error = None;
    self.state = SessionState::Loading;

    let outcome = self.load_first_page(true).await;
    self.state = SessionState::Ready;
    outcome
  }

  /// Append the next page. A no-op while loading or once exhausted.
  pub async fn load_more(&mut self) -> Result<PageOutcome> {
    if self.state != SessionState::Ready {
      return Ok(PageOutcome::Skipped);
    }

    // Page 1 failed earlier; retry it through the cache
    if self.paginator.cursor().page_number == 1 {
      return self.load_first_page(false).await;
    }

    let api = self.api.clone();
    let page_size = self.options.page_size;
    self
      .paginator
      .request_next_page(move |page| async move { api.postings_page(page, page_size).await })
      .await
  }

  pub fn cursor(&self) -> PaginationCursor {
    self.paginator.cursor()
  }

  /// Suggested wait before retrying a failed page
  pub fn retry_delay(&self) -> Option<Duration> {
    self.paginator.retry_delay()
  }

  /// The master collection, newest first
  pub fn postings(&self) -> &[Posting] {
    self.paginator.items()
  }

  /// The master collection under the current filters
  pub fn visible(&self) -> Vec<&Posting> {
    derive(self.paginator.items(), &self.filters)
  }

  pub fn filters(&self) -> &FilterState {
    &self.filters
  }

  pub fn set_filters(&mut self, filters: FilterState) {
    self.filters = filters;
  }

  pub fn clear_filters(&mut self) {
    self.filters.clear();
  }

  /// Where page 1 came from on the last activation or refresh
  pub fn first_page_source(&self) -> Option<CacheSource> {
    self.first_page_source
  }

  /// A failed forced refresh that was papered over with cached data
  pub fn last_error(&self) -> Option<&SyncError> {
    self.last_error.as_ref()
  }

  /// Request applicant counts for every visible posting that has none yet.
  pub fn enrich_visible(&mut self) -> usize {
    let ids: Vec<String> = self.visible().iter().map(|p| p.id.clone()).collect();
    let api = self.api.clone();
    self.applicants.request(ids, move |id| {
      let api = api.clone();
      async move { api.applicant_count(&id).await }
    })
  }

  /// Drain finished applicant counts. `true` if any arrived.
  pub fn poll(&mut self) -> bool {
    self.applicants.poll()
  }

  /// Wait for every outstanding applicant count.
  pub async fn settle(&mut self) {
    self.applicants.settle().await
  }

  pub fn applicants(&self, posting_id: &str) -> SubresourceStatus<'_, u64> {
    self.applicants.status(posting_id)
  }

  /// Posting detail, cache-first unless `force`.
  pub async fn posting(&self, id: &str, force: bool) -> Result<CacheResult<Posting>> {
    let api = self.api.clone();
    let owned = id.to_string();
    self
      .loader
      .load(&ResourceKey::posting(id), self.freshness().forced_if(force), || async move {
        api.posting(&owned).await
      })
      .await
  }

  /// Apply to a posting, then tell every screen that applications changed.
  pub async fn apply(&mut self, posting_id: &str) -> Result<()> {
    self.api.apply(posting_id).await?;
    tracing::info!(posting = %posting_id, "application submitted");

    self.coordinator.publish(RefreshScope::Applications);

    let api = self.api.clone();
    self.applicants.refresh([posting_id], move |id| {
      let api = api.clone();
      async move { api.applicant_count(&id).await }
    });
    Ok(())
  }

  fn freshness(&self) -> Freshness {
    match self.options.max_age {
      Some(max_age) => Freshness::max_age(max_age),
      None => Freshness::cache_first(),
    }
  }

  async fn load_first_page(&mut self, force: bool) -> Result<PageOutcome> {
    let Some(ticket) = self.paginator.begin() else {
      return Ok(PageOutcome::Skipped);
    };

    let page_size = self.options.page_size;
    let key = ResourceKey::postings_page(1, page_size);
    let api = self.api.clone();
    let loaded = self
      .loader
      .load(&key, self.freshness().forced_if(force), || async move {
        api.postings_page(1, page_size).await
      })
      .await;

    match loaded {
      Ok(result) => {
        self.first_page_source = Some(result.source);
        self.paginator.finish(ticket, Ok(result.data))
      }
      Err(e @ SyncError::RefreshFailed { .. }) => {
        match self.loader.peek::<Vec<Posting>>(&key) {
          Some(cached) => {
            tracing::warn!(error = %e, "showing cached feed after failed refresh");
            self.last_error = Some(e);
            self.first_page_source = Some(CacheSource::Stale);
            self.paginator.finish(ticket, Ok(cached.data))
          }
          None => self.paginator.finish(ticket, Err(e)),
        }
      }
      Err(e) => self.paginator.finish(ticket, Err(e)),
    }
  }
}
