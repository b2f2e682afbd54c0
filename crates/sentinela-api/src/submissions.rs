//! `POST /submissions`: register the reporter and open an alert.
//!
//! Photos travel base64-encoded inside the JSON body:
//!
//! ```json
//! {
//!   "contact": "(68) 99999-0001",
//!   "display_name": "Maria",
//!   "lat": -9.9747, "lng": -67.8107,
//!   "address": "Av. Ceará, 1500",
//!   "photos": [{ "media_type": "image/jpeg", "data": "/9j/4AAQ..." }]
//! }
//! ```

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sentinela_core::{
  alert::PhotoUpload, geo::GeoPoint, store::AlertStore, upload::EvidenceUploader,
};
use sentinela_engine::{Engine, Receipt, Submission};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PhotoBody {
  pub media_type: String,
  /// Standard base64, padded.
  pub data:       String,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionBody {
  pub contact:      String,
  pub display_name: String,
  pub lat:          f64,
  pub lng:          f64,
  pub address:      String,
  #[serde(default)]
  pub neighborhood: Option<String>,
  #[serde(default)]
  pub note:         Option<String>,
  #[serde(default)]
  pub photos:       Vec<PhotoBody>,
}

impl SubmissionBody {
  fn into_submission(self) -> Result<Submission, ApiError> {
    let photos = self
      .photos
      .into_iter()
      .enumerate()
      .map(|(i, p)| {
        let data = STANDARD
          .decode(p.data.trim())
          .map_err(|e| ApiError::BadRequest(format!("photo {i}: {e}")))?;
        Ok(PhotoUpload { media_type: p.media_type, data })
      })
      .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Submission {
      contact: self.contact,
      display_name: self.display_name,
      location: GeoPoint::new(self.lat, self.lng),
      address: self.address,
      neighborhood: self.neighborhood,
      note: self.note,
      photos,
    })
  }
}

/// `POST /submissions`
pub async fn create<S, U>(
  State(engine): State<Arc<Engine<S, U>>>,
  Json(body): Json<SubmissionBody>,
) -> Result<(StatusCode, Json<Receipt>), ApiError>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  let receipt = engine.submit(body.into_submission()?).await?;
  Ok((StatusCode::CREATED, Json(receipt)))
}
