//! The change-event source: a content-agnostic wake-up signal fired whenever
//! an alert or an evidence row is written.

use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts lagging. A lagging
/// subscriber only loses wake-ups, never data.
pub const CHANNEL_CAPACITY: usize = 64;

/// What kind of row changed. Carried for logging only; subscribers must not
/// rely on it to patch their state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
  Alert,
  Evidence,
}

/// Fan-out of [`ChangeEvent`]s to any number of subscribers.
///
/// Cloning is cheap; clones share the same channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
  tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { tx }
  }

  /// Fire an event. A feed with no subscribers drops it silently.
  pub fn notify(&self, event: ChangeEvent) { let _ = self.tx.send(event); }

  pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
    self.tx.subscribe()
  }

  pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

impl Default for ChangeFeed {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_receive_events() {
    let feed = ChangeFeed::new();
    let mut rx = feed.subscribe();
    feed.notify(ChangeEvent::Evidence);
    assert_eq!(rx.recv().await.unwrap(), ChangeEvent::Evidence);
  }

  #[test]
  fn notify_without_subscribers_is_harmless() {
    let feed = ChangeFeed::new();
    feed.notify(ChangeEvent::Alert);
    assert_eq!(feed.subscriber_count(), 0);
  }
}
