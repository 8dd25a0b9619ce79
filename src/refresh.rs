//! Cross-screen "your data changed" notifications.
//!
//! A mutation publishes the scope it touched. Each screen session subscribes
//! to the scopes it renders and consumes a pending notification exactly once
//! when it next gains focus. Screens showing unrelated resources are never
//! forced to refresh.

use std::collections::BTreeSet;
use std::fmt;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Which resource family a mutation invalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefreshScope {
  /// The postings feed and posting details
  Postings,
  /// Applications and the counts derived from them
  Applications,
}

impl fmt::Display for RefreshScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RefreshScope::Postings => f.write_str("postings"),
      RefreshScope::Applications => f.write_str("applications"),
    }
  }
}

/// Shared publish side. Cheap to clone.
#[derive(Clone)]
pub struct RefreshCoordinator {
  sender: broadcast::Sender<RefreshScope>,
}

impl Default for RefreshCoordinator {
  fn default() -> Self {
    let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { sender }
  }
}

impl RefreshCoordinator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Mark `scope` stale for every current subscriber.
  pub fn publish(&self, scope: RefreshScope) {
    // No subscribers is fine: nobody is showing the data
    let receivers = self.sender.send(scope).unwrap_or(0);
    tracing::debug!(scope = %scope, receivers, "refresh published");
  }

  /// Start listening for `scopes`. Dropping the subscription unsubscribes.
  pub fn subscribe(&self, scopes: &[RefreshScope]) -> RefreshSubscription {
    RefreshSubscription {
      receiver: self.sender.subscribe(),
      scopes: scopes.iter().copied().collect(),
      pending: BTreeSet::new(),
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.sender.receiver_count()
  }
}

/// One screen's view of the refresh channel
pub struct RefreshSubscription {
  receiver: broadcast::Receiver<RefreshScope>,
  scopes: BTreeSet<RefreshScope>,
  pending: BTreeSet<RefreshScope>,
}

impl RefreshSubscription {
  /// Consume the pending notification for `scope`, if any.
  ///
  /// Returns `true` at most once per burst of publishes.
  pub fn take(&mut self, scope: RefreshScope) -> bool {
    self.drain();
    let taken = self.pending.remove(&scope);
    if taken {
      tracing::debug!(scope = %scope, "refresh consumed");
    }
    taken
  }

  /// Whether `scope` has a notification waiting, without consuming it.
  pub fn is_pending(&mut self, scope: RefreshScope) -> bool {
    self.drain();
    self.pending.contains(&scope)
  }

  fn drain(&mut self) {
    loop {
      match self.receiver.try_recv() {
        Ok(scope) => {
          if self.scopes.contains(&scope) {
            self.pending.insert(scope);
          }
        }
        Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
          // Lost track of what changed; refreshing everything is safe
          tracing::debug!(skipped, "refresh subscription lagged");
          self.pending.extend(self.scopes.iter().copied());
        }
        Err(broadcast::error::TryRecvError::Empty)
        | Err(broadcast::error::TryRecvError::Closed) => break,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_take_consumes_exactly_once() {
    let coordinator = RefreshCoordinator::new();
    let mut feed = coordinator.subscribe(&[RefreshScope::Postings]);

    assert!(!feed.take(RefreshScope::Postings));

    coordinator.publish(RefreshScope::Postings);
    coordinator.publish(RefreshScope::Postings);
    assert!(feed.take(RefreshScope::Postings));
    assert!(!feed.take(RefreshScope::Postings));
  }

  #[test]
  fn test_unrelated_scopes_are_ignored() {
    let coordinator = RefreshCoordinator::new();
    let mut feed = coordinator.subscribe(&[RefreshScope::Postings]);
    let mut applications = coordinator.subscribe(&[RefreshScope::Applications]);

    coordinator.publish(RefreshScope::Applications);

    assert!(!feed.take(RefreshScope::Postings));
    assert!(!feed.take(RefreshScope::Applications));
    assert!(applications.is_pending(RefreshScope::Applications));
    assert!(applications.take(RefreshScope::Applications));
  }

  #[test]
  fn test_every_subscriber_sees_the_publish() {
    let coordinator = RefreshCoordinator::new();
    let mut a = coordinator.subscribe(&[RefreshScope::Postings]);
    let mut b = coordinator.subscribe(&[RefreshScope::Postings]);

    coordinator.publish(RefreshScope::Postings);

    assert!(a.take(RefreshScope::Postings));
    assert!(b.take(RefreshScope::Postings));
  }

  #[test]
  fn test_drop_unsubscribes() {
    let coordinator = RefreshCoordinator::new();
    let subscription = coordinator.subscribe(&[RefreshScope::Postings]);
    assert_eq!(coordinator.subscriber_count(), 1);

    drop(subscription);
    assert_eq!(coordinator.subscriber_count(), 0);

    // Publishing with nobody listening is not an error
    coordinator.publish(RefreshScope::Postings);
  }

  #[test]
  fn test_lagged_subscriber_refreshes_everything() {
    let coordinator = RefreshCoordinator::new();
    let mut both = coordinator.subscribe(&[RefreshScope::Postings, RefreshScope::Applications]);

    for _ in 0..(CHANNEL_CAPACITY + 10) {
      coordinator.publish(RefreshScope::Applications);
    }

    assert!(both.take(RefreshScope::Postings));
    assert!(both.take(RefreshScope::Applications));
  }
}
