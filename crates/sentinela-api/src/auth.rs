//! Bearer-token extraction for the `/me` endpoints.
//!
//! The token is the identity's management token. Presence and shape are
//! checked here; whether it belongs to anyone is the engine's call.

use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};

use crate::error::ApiError;

/// The raw token from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let value = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::Unauthorized)?;
    parse_bearer(value).map(BearerToken).ok_or(ApiError::Unauthorized)
  }
}

fn parse_bearer(value: &str) -> Option<String> {
  let (scheme, token) = value.trim().split_once(' ')?;
  let token = token.trim();
  (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}
