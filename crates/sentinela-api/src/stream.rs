//! `GET /alerts/stream`: a live listing over server-sent events.
//!
//! Each request opens its own [`Subscription`]; the stream owns it, so a
//! client hanging up drops the subscription and stops its driver.
//!
//! Events:
//! - `snapshot`: a fresh [`sentinela_engine::Snapshot`] as JSON.
//! - `stale`: the last refresh failed. Data is `{"seq", "error"}`; the last
//!   snapshot sent is still the best available.

use std::{convert::Infallible, sync::Arc};

use axum::{
  extract::{Query, State},
  response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, stream};
use sentinela_core::{store::AlertStore, upload::EvidenceUploader};
use sentinela_engine::{Engine, Subscription, SyncState};
use serde_json::json;

use crate::{alerts::FilterParams, error::ApiError};

/// `GET /alerts/stream[?filter=<filter>]`
pub async fn handler<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  Query(params): Query<FilterParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  let filter = params.parse()?;
  Ok(Sse::new(events(engine.subscribe(filter))).keep_alive(KeepAlive::default()))
}

fn events(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
  stream::unfold(subscription, |mut sub| async move {
    loop {
      let state = sub.changed().await?;
      if let Some(event) = to_event(&state) {
        return Some((Ok(event), sub));
      }
    }
  })
}

fn to_event(state: &SyncState) -> Option<Event> {
  let snapshot = state.snapshot.as_deref();
  if state.stale {
    let data = json!({
      "seq": snapshot.map(|s| s.seq),
      "error": state.last_error,
    });
    return Some(Event::default().event("stale").data(data.to_string()));
  }
  let snapshot = snapshot?;
  match Event::default().event("snapshot").json_data(snapshot) {
    Ok(event) => Some(event.id(snapshot.seq.to_string())),
    Err(e) => {
      tracing::warn!(error = %e, "could not encode snapshot");
      None
    }
  }
}
