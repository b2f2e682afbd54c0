//! Handlers for the public `/alerts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/alerts` | `?filter=active-24h\|active-6h\|history`; ETag / 304 |
//! | `GET`  | `/alerts/:id` | 404 if not found |
//! | `GET`  | `/stats` | Counts over every alert |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use sentinela_core::{alert::AlertView, store::AlertStore, upload::EvidenceUploader};
use sentinela_engine::{AlertFilter, AlertStats, Engine};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  error::ApiError,
  etag::{listing_etag, not_modified},
};

#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
  pub filter: Option<String>,
}

impl FilterParams {
  /// The requested filter, or the default 24-hour active view.
  pub fn parse(&self) -> Result<AlertFilter, ApiError> {
    match self.filter.as_deref() {
      None => Ok(AlertFilter::default()),
      Some(raw) => raw
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown filter: {raw}"))),
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /alerts[?filter=<filter>]`
pub async fn list<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  Query(params): Query<FilterParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  let filter = params.parse()?;
  let listing = engine.manager().listing(filter).await?;
  let etag = listing_etag(&listing);
  if not_modified(&headers, &etag) {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }
  Ok(([(header::ETAG, etag)], Json(listing)).into_response())
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /alerts/:id`
pub async fn get_one<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AlertView>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Ok(Json(engine.manager().get_view(id).await?))
}

// ─── Stats ────────────────────────────────────────────────────────────────────

/// `GET /stats`
pub async fn stats<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
) -> Result<Json<AlertStats>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Ok(Json(engine.manager().stats().await?))
}
