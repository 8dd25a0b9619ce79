//! Per-item auxiliary fetches (applicant counts and the like).
//!
//! [`FanoutFetcher`] is demand-driven: each id gets its own task, requests
//! for an id already in flight are coalesced, and results are drained with
//! [`FanoutFetcher::poll`] from the owning event loop. Nothing here blocks a
//! render; ids without a result simply have no entry yet.
//!
//! ```ignore
//! let api = api.clone();
//! fanout.request(ids, move |id| {
//!   let api = api.clone();
//!   async move { api.applicant_count(&id).await }
//! });
//!
//! // In event loop tick
//! if fanout.poll() {
//!   // Counts changed, re-render
//! }
//! ```

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, SyncError};

type Completion<V> = (String, Result<V>);

/// What is known about one id's subresource
#[derive(Debug, PartialEq)]
pub enum SubresourceStatus<'a, V> {
  NotRequested,
  Loading,
  Ready(&'a V),
  /// The last fetch failed; render as unknown, never as a default value
  Unavailable,
}

/// Concurrent, coalescing, cancellable per-id fetcher.
pub struct FanoutFetcher<V> {
  values: HashMap<String, V>,
  in_flight: HashMap<String, JoinHandle<()>>,
  failed: HashSet<String>,
  sender: mpsc::UnboundedSender<Completion<V>>,
  receiver: mpsc::UnboundedReceiver<Completion<V>>,
}

impl<V: Send + 'static> Default for FanoutFetcher<V> {
  fn default() -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      values: HashMap::new(),
      in_flight: HashMap::new(),
      failed: HashSet::new(),
      sender,
      receiver,
    }
  }
}

impl<V: Send + 'static> FanoutFetcher<V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start a fetch for every id that has no value and is not in flight.
  ///
  /// Returns how many fetches were started. Must be called from within a
  /// tokio runtime.
  pub fn request<I, F, Fut>(&mut self, ids: I, fetcher: F) -> usize
  where
    I: IntoIterator,
    I::Item: Into<String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<V>> + Send + 'static,
  {
    let mut started = 0;
    for id in ids {
      let id = id.into();
      if self.values.contains_key(&id) || self.in_flight.contains_key(&id) {
        continue;
      }
      self.spawn(id, &fetcher);
      started += 1;
    }
    started
  }

  /// Re-fetch ids even if a value is known. In-flight ids are still
  /// coalesced. The newest result overwrites the old one.
  pub fn refresh<I, F, Fut>(&mut self, ids: I, fetcher: F) -> usize
  where
    I: IntoIterator,
    I::Item: Into<String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<V>> + Send + 'static,
  {
    let mut started = 0;
    for id in ids {
      let id = id.into();
      if self.in_flight.contains_key(&id) {
        continue;
      }
      self.spawn(id, &fetcher);
      started += 1;
    }
    started
  }

  /// Drain finished fetches without blocking.
  ///
  /// Returns `true` if anything changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok((id, result)) = self.receiver.try_recv() {
      self.complete(id, result);
      changed = true;
    }
    changed
  }

  /// Wait until nothing is in flight.
  pub async fn settle(&mut self) {
    while !self.in_flight.is_empty() {
      match self.receiver.recv().await {
        Some((id, result)) => self.complete(id, result),
        None => break,
      }
    }
  }

  /// Abort in-flight fetches. Results that still arrive are discarded.
  pub fn cancel(&mut self) {
    if self.in_flight.is_empty() {
      return;
    }
    tracing::debug!(count = self.in_flight.len(), "cancelling subresource fetches");
    for (_, handle) in self.in_flight.drain() {
      handle.abort();
    }
    let (sender, receiver) = mpsc::unbounded_channel();
    self.sender = sender;
    self.receiver = receiver;
  }

  /// Cancel and forget every value and failure.
  pub fn clear(&mut self) {
    self.cancel();
    self.values.clear();
    self.failed.clear();
  }

  pub fn status(&self, id: &str) -> SubresourceStatus<'_, V> {
    if let Some(value) = self.values.get(id) {
      SubresourceStatus::Ready(value)
    } else if self.in_flight.contains_key(id) {
      SubresourceStatus::Loading
    } else if self.failed.contains(id) {
      SubresourceStatus::Unavailable
    } else {
      SubresourceStatus::NotRequested
    }
  }

  pub fn get(&self, id: &str) -> Option<&V> {
    self.values.get(id)
  }

  /// Every id that resolved successfully
  pub fn map(&self) -> &HashMap<String, V> {
    &self.values
  }

  pub fn in_flight(&self) -> usize {
    self.in_flight.len()
  }

  fn spawn<F, Fut>(&mut self, id: String, fetcher: &F)
  where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<V>> + Send + 'static,
  {
    let future = fetcher(id.clone());
    let sender = self.sender.clone();
    let task_id = id.clone();
    let handle = tokio::spawn(async move {
      // A panicking fetch still completes its id
      let result = match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(SyncError::TaskFailed(panic_message(panic.as_ref()))),
      };
      // Receiver may have been replaced by cancel()
      let _ = sender.send((task_id, result));
    });
    self.in_flight.insert(id, handle);
  }

  fn complete(&mut self, id: String, result: Result<V>) {
    if self.in_flight.remove(&id).is_none() {
      return;
    }
    match result {
      Ok(value) => {
        self.failed.remove(&id);
        self.values.insert(id, value);
      }
      Err(e) => {
        let err = SyncError::Subresource {
          id: id.clone(),
          source: Box::new(e),
        };
        tracing::warn!(id = %id, error = %err, "subresource unavailable");
        // A previously known value stays visible
        if !self.values.contains_key(&id) {
          self.failed.insert(id);
        }
      }
    }
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "task panicked".to_string()
  }
}

impl<V> Drop for FanoutFetcher<V> {
  fn drop(&mut self) {
    for (_, handle) in self.in_flight.drain() {
      handle.abort();
    }
  }
}

/// Outcome of a one-shot fan-out
#[derive(Debug)]
pub struct FanoutReport<V> {
  pub values: HashMap<String, V>,
  /// Ids whose fetch failed, sorted
  pub failed: Vec<String>,
}

/// Fetch one subresource per id, at most `concurrency` at a time, and wait
/// for all of them. A failing id never aborts the others.
pub async fn fetch_subresources<I, F, Fut, V>(
  ids: I,
  concurrency: usize,
  fetcher: F,
) -> FanoutReport<V>
where
  I: IntoIterator,
  I::Item: Into<String>,
  F: Fn(String) -> Fut,
  Fut: Future<Output = Result<V>>,
{
  let unique: Vec<String> = {
    let mut seen = HashSet::new();
    ids
      .into_iter()
      .map(Into::into)
      .filter(|id: &String| seen.insert(id.clone()))
      .collect()
  };

  let results: Vec<Completion<V>> = stream::iter(unique)
    .map(|id| {
      let future = fetcher(id.clone());
      async move { (id, future.await) }
    })
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

  let mut report = FanoutReport {
    values: HashMap::new(),
    failed: Vec::new(),
  };
  for (id, result) in results {
    match result {
      Ok(value) => {
        report.values.insert(id, value);
      }
      Err(e) => {
        tracing::warn!(id = %id, error = %e, "subresource unavailable");
        report.failed.push(id);
      }
    }
  }
  report.failed.sort();
  report
}
