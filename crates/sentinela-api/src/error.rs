//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Engine(#[from] sentinela_core::Error),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("missing or malformed bearer token")]
  Unauthorized,
}

impl ApiError {
  fn status(&self) -> StatusCode {
    use sentinela_core::Error as E;
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Engine(e) => match e {
        E::Validation(_) | E::OutOfBounds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        E::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        E::AlertNotFound(_) | E::IdentityNotFound(_) | E::UnknownToken => {
          StatusCode::NOT_FOUND
        }
        E::InvalidTransition { .. } => StatusCode::CONFLICT,
        E::TransientSync(_) => StatusCode::SERVICE_UNAVAILABLE,
        E::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = Json(json!({ "error": self.to_string() }));
    match self {
      ApiError::Unauthorized => {
        (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
      }
      _ => (status, body).into_response(),
    }
  }
}
