//! Live, filtered alert listings for viewers.
//!
//! Each [`Subscription`] owns one driver task. The driver turns three kinds
//! of trigger (change-feed wake-ups, a fixed poll tick, and manual refresh
//! requests) into a single-flight refresh:
//!
//! ```text
//!  change feed ─┐
//!  poll tick ───┼─► invalidate ─► fetch (one in flight, one queued) ─► publish
//!  refresh() ───┘
//! ```
//!
//! A trigger that arrives while a fetch is running queues exactly one
//! follow-up, however many arrive. Results carry a sequence number and are
//! only published if newer than the last publish and the subscription is
//! still open. A failed fetch keeps the last good snapshot and marks it
//! stale; the poll tick keeps running, so the next tick retries.
//!
//! The broadcaster never writes to the store. Lazy expiry is recomputed in
//! memory, so a refresh cannot cause change events of its own.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use sentinela_core::{
  Error, Result,
  alert::AlertView,
  changes::ChangeEvent,
  clock::Clock,
  store::{AlertQuery, AlertStore},
};
use serde::Serialize;
use tokio::{
  sync::{broadcast, mpsc, watch},
  task::JoinHandle,
  time::{self, Instant, MissedTickBehavior},
};

use crate::view::{self, AlertFilter, AlertStats};

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

// ─── Published state ─────────────────────────────────────────────────────────

/// One successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
  /// Filtered, newest first.
  pub alerts:     Vec<AlertView>,
  /// Over every alert, from the same fetch as `alerts`.
  pub stats:      AlertStats,
  pub fetched_at: DateTime<Utc>,
  pub seq:        u64,
}

/// What a subscriber sees.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
  /// The last good snapshot; `None` until the first refresh succeeds.
  pub snapshot:   Option<Arc<Snapshot>>,
  /// The most recent refresh failed; `snapshot` is older than it should be.
  pub stale:      bool,
  pub last_error: Option<String>,
}

// ─── Broadcaster ─────────────────────────────────────────────────────────────

pub struct SyncBroadcaster<S> {
  store:         Arc<S>,
  clock:         Arc<dyn Clock>,
  poll_interval: Duration,
}

impl<S> SyncBroadcaster<S>
where
  S: AlertStore + 'static,
{
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, poll_interval: Duration) -> Self {
    Self { store, clock, poll_interval }
  }

  pub fn poll_interval(&self) -> Duration { self.poll_interval }

  /// Start a subscription. The first fetch begins immediately.
  ///
  /// Must be called from within a tokio runtime.
  pub fn subscribe(&self, filter: AlertFilter) -> Subscription {
    let (state_tx, state_rx) = watch::channel(SyncState::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let alive = Arc::new(AtomicBool::new(true));

    // Subscribe before the first fetch starts so no write slips between.
    let changes = self.store.changes().subscribe();

    let driver = Driver {
      store: self.store.clone(),
      clock: self.clock.clone(),
      filter,
      state: state_tx,
      alive: alive.clone(),
      flight: Flight::default(),
    };
    let task = tokio::spawn(driver.run(changes, shutdown_rx, refresh_rx, self.poll_interval));
    tracing::debug!(%filter, "subscription opened");

    Subscription {
      filter,
      state: state_rx,
      shutdown: shutdown_tx,
      refresh: refresh_tx,
      alive,
      task: Some(task),
    }
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// A viewer's handle. Dropping it tears the subscription down.
pub struct Subscription {
  filter:   AlertFilter,
  state:    watch::Receiver<SyncState>,
  shutdown: watch::Sender<bool>,
  refresh:  mpsc::Sender<()>,
  alive:    Arc<AtomicBool>,
  task:     Option<JoinHandle<()>>,
}

impl Subscription {
  pub fn filter(&self) -> AlertFilter { self.filter }

  pub fn current(&self) -> SyncState { self.state.borrow().clone() }

  /// A receiver that observes every publish, independent of this handle.
  pub fn watch(&self) -> watch::Receiver<SyncState> { self.state.clone() }

  /// Wait for the next publish. `None` once the subscription has closed.
  pub async fn changed(&mut self) -> Option<SyncState> {
    self.state.changed().await.ok()?;
    Some(self.state.borrow_and_update().clone())
  }

  /// Ask for a refresh now. Coalesces with any refresh already queued.
  pub fn refresh(&self) {
    // A full channel already holds a request.
    let _ = self.refresh.try_send(());
  }

  pub fn is_alive(&self) -> bool { self.alive.load(Ordering::Acquire) }

  /// Stop both triggers. Safe to call more than once. A fetch still in
  /// flight finishes but is never published.
  pub fn close(&self) {
    if self.alive.swap(false, Ordering::AcqRel) {
      self.shutdown.send_replace(true);
      tracing::debug!(filter = %self.filter, "subscription closed");
    }
  }

  /// Close and wait for the driver task to exit.
  pub async fn shutdown(mut self) {
    self.close();
    if let Some(task) = self.task.take() {
      if let Err(e) = task.await {
        tracing::warn!(error = %e, "sync driver ended abnormally");
      }
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.close(); }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Trigger {
  Change(ChangeEvent),
  /// The feed overflowed; some wake-ups were lost, which still means
  /// something changed.
  Lagged(u64),
  Poll,
  Manual,
}

/// Single-flight bookkeeping, owned by the driver task alone.
#[derive(Debug, Default)]
struct Flight {
  in_flight: bool,
  /// A trigger arrived mid-flight; fetch once more when it lands.
  pending:   bool,
  next_seq:  u64,
  published: u64,
}

type Done = (u64, Result<view::Listing>, DateTime<Utc>);

struct Driver<S> {
  store:  Arc<S>,
  clock:  Arc<dyn Clock>,
  filter: AlertFilter,
  state:  watch::Sender<SyncState>,
  alive:  Arc<AtomicBool>,
  flight: Flight,
}

impl<S> Driver<S>
where
  S: AlertStore + 'static,
{
  async fn run(
    mut self,
    mut changes: broadcast::Receiver<ChangeEvent>,
    mut shutdown: watch::Receiver<bool>,
    mut refresh: mpsc::Receiver<()>,
    period: Duration,
  ) {
    let (done_tx, mut done_rx) = mpsc::channel::<Done>(1);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut feed_open = true;

    self.start_fetch(&done_tx);

    loop {
      // Triggers are polled ahead of completions so that every wake-up
      // already queued is folded into the pending flag before a fetch lands.
      let trigger = tokio::select! {
        biased;

        _ = shutdown.changed() => break,

        event = changes.recv(), if feed_open => match event {
          Ok(event) => Trigger::Change(event),
          Err(broadcast::error::RecvError::Lagged(n)) => Trigger::Lagged(n),
          Err(broadcast::error::RecvError::Closed) => {
            tracing::debug!("change feed closed, polling only");
            feed_open = false;
            continue;
          }
        },

        _ = ticker.tick() => Trigger::Poll,

        Some(()) = refresh.recv() => Trigger::Manual,

        Some((seq, result, fetched_at)) = done_rx.recv() => {
          self.finish(seq, result, fetched_at);
          if std::mem::take(&mut self.flight.pending) {
            self.start_fetch(&done_tx);
          }
          continue;
        }
      };
      self.invalidate(trigger, &done_tx);
    }
    tracing::debug!(filter = %self.filter, "sync driver stopped");
  }

  fn invalidate(&mut self, trigger: Trigger, done_tx: &mpsc::Sender<Done>) {
    match trigger {
      Trigger::Change(event) => tracing::trace!(?event, "change event"),
      Trigger::Lagged(missed) => tracing::debug!(missed, "change feed lagged"),
      Trigger::Poll | Trigger::Manual => {}
    }
    if self.flight.in_flight {
      if !self.flight.pending {
        tracing::debug!(?trigger, "refresh in flight, queueing one follow-up");
      }
      self.flight.pending = true;
      return;
    }
    tracing::trace!(?trigger, seq = self.flight.next_seq + 1, "refreshing");
    self.start_fetch(done_tx);
  }

  fn start_fetch(&mut self, done_tx: &mpsc::Sender<Done>) {
    self.flight.in_flight = true;
    self.flight.next_seq += 1;
    let seq = self.flight.next_seq;

    let store = self.store.clone();
    let clock = self.clock.clone();
    let filter = self.filter;
    let done = done_tx.clone();
    tokio::spawn(async move {
      let now = clock.now();
      let result = fetch(&*store, filter, now).await;
      // The driver may be gone; the result is simply dropped then.
      let _ = done.send((seq, result, now)).await;
    });
  }

  fn finish(&mut self, seq: u64, result: Result<view::Listing>, fetched_at: DateTime<Utc>) {
    self.flight.in_flight = false;
    if !self.alive.load(Ordering::Acquire) {
      return;
    }
    if seq <= self.flight.published {
      tracing::debug!(seq, published = self.flight.published, "discarding superseded refresh");
      return;
    }

    match result {
      Ok(listing) => {
        self.flight.published = seq;
        self.state.send_replace(SyncState {
          snapshot:   Some(Arc::new(Snapshot {
            alerts: listing.alerts,
            stats: listing.stats,
            fetched_at,
            seq,
          })),
          stale:      false,
          last_error: None,
        });
      }
      Err(e) => {
        tracing::warn!(seq, error = %e, "refresh failed, keeping last snapshot");
        self.state.send_modify(|s| {
          s.stale = true;
          s.last_error = Some(e.to_string());
        });
      }
    }
  }
}

/// Fetch every alert and every evidence row, then derive the listing.
async fn fetch<S: AlertStore>(
  store: &S,
  filter: AlertFilter,
  now: DateTime<Utc>,
) -> Result<view::Listing> {
  let alerts = store
    .list_alerts(AlertQuery::all())
    .await
    .map_err(|e| Error::TransientSync(e.to_string()))?;
  let evidence = store
    .list_evidence(None)
    .await
    .map_err(|e| Error::TransientSync(e.to_string()))?;
  Ok(view::build_listing(alerts, evidence, filter, now))
}
