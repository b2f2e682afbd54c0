//! Token-authenticated endpoints for a reporter's own alerts.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/me` | The identity behind the token |
//! | `GET`  | `/me/alerts` | Every alert, newest first |
//! | `POST` | `/me/alerts/:id/resolve` | 409 if expired |
//! | `POST` | `/me/alerts/:id/renew` | From any status |
//! | `PUT`  | `/me/alerts/:id/note` | Body: `{"note": "..."}`; `null` clears |
//!
//! An alert owned by someone else answers 404, same as a missing one.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use sentinela_core::{
  alert::AlertView, identity::Identity, store::AlertStore, upload::EvidenceUploader,
};
use sentinela_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth::BearerToken, error::ApiError};

/// `GET /me`
pub async fn whoami<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  BearerToken(token): BearerToken,
) -> Result<Json<Identity>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Ok(Json(engine.identities().find_by_token(&token).await?))
}

/// `GET /me/alerts`
pub async fn list<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  BearerToken(token): BearerToken,
) -> Result<Json<Vec<AlertView>>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  let (_, alerts) = engine.my_alerts(&token).await?;
  Ok(Json(alerts))
}

/// `POST /me/alerts/:id/resolve`
pub async fn resolve<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  BearerToken(token): BearerToken,
  Path(id): Path<Uuid>,
) -> Result<Json<AlertView>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Ok(Json(engine.resolve_mine(&token, id).await?))
}

/// `POST /me/alerts/:id/renew`
pub async fn renew<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  BearerToken(token): BearerToken,
  Path(id): Path<Uuid>,
) -> Result<Json<AlertView>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Ok(Json(engine.renew_mine(&token, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
  #[serde(default)]
  pub note: Option<String>,
}

/// `PUT /me/alerts/:id/note`
pub async fn update_note<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  BearerToken(token): BearerToken,
  Path(id): Path<Uuid>,
  Json(body): Json<NoteBody>,
) -> Result<Json<AlertView>, ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Ok(Json(engine.update_my_note(&token, id, body.note).await?))
}
