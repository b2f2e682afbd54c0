//! JSON REST API for Sentinela.
//!
//! Exposes an axum [`Router`] over a shared [`Engine`]. TLS, rate limiting
//! and request tracing are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sentinela_api::api_router(engine.clone()))
//! ```

pub mod alerts;
pub mod auth;
pub mod error;
pub mod etag;
pub mod me;
pub mod stream;
pub mod submissions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use sentinela_core::{store::AlertStore, upload::EvidenceUploader};
use sentinela_engine::Engine;

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, U>(engine: Arc<Engine<S, U>>) -> Router<()>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Router::new()
    // Reporting
    .route("/submissions", post(submissions::create::<S, U>))
    // Public views
    .route("/alerts", get(alerts::list::<S, U>))
    .route("/alerts/stream", get(stream::handler::<S, U>))
    .route("/alerts/{id}", get(alerts::get_one::<S, U>))
    .route("/stats", get(alerts::stats::<S, U>))
    // Token holder
    .route("/me", get(me::whoami::<S, U>))
    .route("/me/alerts", get(me::list::<S, U>))
    .route("/me/alerts/{id}/resolve", post(me::resolve::<S, U>))
    .route("/me/alerts/{id}/renew", post(me::renew::<S, U>))
    .route("/me/alerts/{id}/note", put(me::update_note::<S, U>))
    .with_state(engine)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use futures::StreamExt as _;
  use sentinela_core::{
    memory::{MemoryStore, MemoryUploader},
    policy::Policy,
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  type TestEngine = Arc<Engine<MemoryStore, MemoryUploader>>;

  fn engine() -> TestEngine {
    Arc::new(Engine::new(
      Arc::new(MemoryStore::new()),
      Arc::new(MemoryUploader::new()),
      Policy::default(),
    ))
  }

  async fn oneshot_raw(
    engine:  TestEngine,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    api_router(engine).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn submission(contact: &str, lat: f64, photos: usize) -> Value {
    let photos: Vec<Value> = (0..photos)
      .map(|i| json!({ "media_type": "image/jpeg", "data": B64.encode([0xff, 0xd8, i as u8]) }))
      .collect();
    json!({
      "contact": contact,
      "display_name": "Maria",
      "lat": lat,
      "lng": -67.8107,
      "address": "Av. Ceará, 1500",
      "neighborhood": "Centro",
      "photos": photos,
    })
  }

  /// Submit one alert and return `(token, alert_id)`.
  async fn submit(engine: &TestEngine, contact: &str, lat: f64) -> (String, String) {
    let resp =
      oneshot_raw(engine.clone(), "POST", "/submissions", vec![], Some(submission(contact, lat, 1)))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let receipt = json_body(resp).await;
    (
      receipt["identity"]["token"].as_str().unwrap().to_owned(),
      receipt["view"]["alert"]["alert_id"].as_str().unwrap().to_owned(),
    )
  }

  fn bearer(token: &str) -> Vec<(header::HeaderName, &str)> {
    vec![(header::AUTHORIZATION, token)]
  }

  // ── Submissions ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn submission_returns_receipt() {
    let e = engine();
    let resp = oneshot_raw(
      e.clone(),
      "POST",
      "/submissions",
      vec![],
      Some(submission("(68) 99999-0001", -9.9747, 2)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    assert_eq!(body["identity"]["contact"], "+5568999990001");
    assert_eq!(body["view"]["alert"]["status"], "ACTIVE");
    assert_eq!(body["view"]["evidence"].as_array().unwrap().len(), 2);
    assert_eq!(body["duplicate_of"], Value::Null);
  }

  #[tokio::test]
  async fn submission_without_photos_is_unprocessable() {
    let resp = oneshot_raw(
      engine(),
      "POST",
      "/submissions",
      vec![],
      Some(submission("(68) 99999-0001", -9.9747, 0)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_body(resp).await["error"].as_str().unwrap().contains("validation"));
  }

  #[tokio::test]
  async fn submission_out_of_bounds_is_unprocessable() {
    let resp = oneshot_raw(
      engine(),
      "POST",
      "/submissions",
      vec![],
      Some(submission("(68) 99999-0001", -9.80, 1)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn submission_with_bad_base64_is_bad_request() {
    let mut body = submission("(68) 99999-0001", -9.9747, 1);
    body["photos"][0]["data"] = json!("not base64!");
    let resp = oneshot_raw(engine(), "POST", "/submissions", vec![], Some(body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn fourth_active_alert_is_too_many() {
    let e = engine();
    for lat in [-9.90, -9.91, -9.92] {
      submit(&e, "(68) 99999-0001", lat).await;
    }
    let resp = oneshot_raw(
      e,
      "POST",
      "/submissions",
      vec![],
      Some(submission("(68) 99999-0001", -9.93, 1)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
  }

  // ── Public views ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn listing_carries_etag_and_honours_if_none_match() {
    let e = engine();
    submit(&e, "(68) 99999-0001", -9.9747).await;

    let resp = oneshot_raw(e.clone(), "GET", "/alerts", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let etag = resp.headers().get(header::ETAG).unwrap().to_str().unwrap().to_owned();
    let body = json_body(resp).await;
    assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(body["stats"]["active"], 1);

    let resp =
      oneshot_raw(e.clone(), "GET", "/alerts", vec![(header::IF_NONE_MATCH, &etag)], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

    submit(&e, "(68) 98888-7777", -9.90).await;
    let resp = oneshot_raw(e, "GET", "/alerts", vec![(header::IF_NONE_MATCH, &etag)], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn history_filter_includes_resolved() {
    let e = engine();
    let (token, id) = submit(&e, "(68) 99999-0001", -9.9747).await;
    let auth = format!("Bearer {token}");
    let uri = format!("/me/alerts/{id}/resolve");
    oneshot_raw(e.clone(), "POST", &uri, bearer(&auth), None).await;

    let active = json_body(oneshot_raw(e.clone(), "GET", "/alerts", vec![], None).await).await;
    assert!(active["alerts"].as_array().unwrap().is_empty());
    assert_eq!(active["stats"]["resolved"], 1);

    let history =
      json_body(oneshot_raw(e, "GET", "/alerts?filter=history", vec![], None).await).await;
    assert_eq!(history["alerts"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn unknown_filter_is_bad_request() {
    let resp = oneshot_raw(engine(), "GET", "/alerts?filter=tomorrow", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn single_alert_and_missing_alert() {
    let e = engine();
    let (_, id) = submit(&e, "(68) 99999-0001", -9.9747).await;

    let resp = oneshot_raw(e.clone(), "GET", &format!("/alerts/{id}"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["alert"]["alert_id"], id.as_str());

    let resp = oneshot_raw(e, "GET", &format!("/alerts/{}", Uuid::new_v4()), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn stats_count_every_alert() {
    let e = engine();
    submit(&e, "(68) 99999-0001", -9.9747).await;
    submit(&e, "(68) 98888-7777", -9.90).await;
    let body = json_body(oneshot_raw(e, "GET", "/stats", vec![], None).await).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["active"], 2);
  }

  // ── Token holder ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn me_requires_a_bearer_token() {
    let resp = oneshot_raw(engine(), "GET", "/me", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
  }

  #[tokio::test]
  async fn unknown_token_is_not_found() {
    let resp = oneshot_raw(engine(), "GET", "/me", bearer("Bearer NOPE1234"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn token_holder_manages_own_alert() {
    let e = engine();
    let (token, id) = submit(&e, "(68) 99999-0001", -9.9747).await;
    let auth = format!("Bearer {}", token.to_ascii_lowercase());

    let me = json_body(oneshot_raw(e.clone(), "GET", "/me", bearer(&auth), None).await).await;
    assert_eq!(me["contact"], "+5568999990001");

    let mine =
      json_body(oneshot_raw(e.clone(), "GET", "/me/alerts", bearer(&auth), None).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let resolve = format!("/me/alerts/{id}/resolve");
    for _ in 0..2 {
      let resp = oneshot_raw(e.clone(), "POST", &resolve, bearer(&auth), None).await;
      assert_eq!(resp.status(), StatusCode::OK);
      assert_eq!(json_body(resp).await["alert"]["status"], "RESOLVED");
    }

    let resp =
      oneshot_raw(e.clone(), "POST", &format!("/me/alerts/{id}/renew"), bearer(&auth), None).await;
    assert_eq!(json_body(resp).await["alert"]["status"], "ACTIVE");

    let resp = oneshot_raw(
      e,
      "PUT",
      &format!("/me/alerts/{id}/note"),
      bearer(&auth),
      Some(json!({ "note": "  água baixando " })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["alert"]["note"], "água baixando");
  }

  #[tokio::test]
  async fn someone_elses_alert_is_not_found() {
    let e = engine();
    let (token, _) = submit(&e, "(68) 99999-0001", -9.9747).await;
    let (_, theirs) = submit(&e, "(68) 98888-7777", -9.90).await;
    let auth = format!("Bearer {token}");

    let resp =
      oneshot_raw(e, "POST", &format!("/me/alerts/{theirs}/resolve"), bearer(&auth), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Stream ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn stream_opens_with_a_snapshot() {
    let e = engine();
    submit(&e, "(68) 99999-0001", -9.9747).await;

    let resp = oneshot_raw(e, "GET", "/alerts/stream", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/event-stream");

    let mut frames = resp.into_body().into_data_stream();
    let first = frames.next().await.unwrap().unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    assert!(text.contains("event: snapshot"), "{text}");
    assert!(text.contains("\"seq\":1"), "{text}");
  }
}
