//! Directory-backed evidence storage.
//!
//! Photos land at `<root>/<alert_id>/<sha256>.<ext>`. The returned reference
//! is that path relative to `root`, so the directory can be served or moved
//! as a unit. Identical bytes for the same alert share a file.

use std::{
  future::Future,
  path::{Path, PathBuf},
};

use sentinela_core::{alert::PhotoUpload, upload::EvidenceUploader};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
  #[error("unsupported media type: {0}")]
  MediaType(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub struct DirectoryUploader {
  root: PathBuf,
}

impl DirectoryUploader {
  /// Use `root` for evidence, creating it if needed.
  pub async fn create(root: impl AsRef<Path>) -> std::io::Result<Self> {
    let root = root.as_ref().to_path_buf();
    tokio::fs::create_dir_all(&root).await?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }
}

fn extension(media_type: &str) -> Option<&'static str> {
  match media_type.trim().to_ascii_lowercase().as_str() {
    "image/jpeg" | "image/jpg" => Some("jpg"),
    "image/png" => Some("png"),
    "image/webp" => Some("webp"),
    "image/heic" => Some("heic"),
    _ => None,
  }
}

impl EvidenceUploader for DirectoryUploader {
  type Error = UploadError;

  fn upload(
    &self,
    alert_id: Uuid,
    position: u32,
    photo: PhotoUpload,
  ) -> impl Future<Output = Result<String, UploadError>> + Send + '_ {
    async move {
      let ext = extension(&photo.media_type)
        .ok_or_else(|| UploadError::MediaType(photo.media_type.clone()))?;
      let name = format!("{}.{ext}", hex::encode(Sha256::digest(&photo.data)));

      let dir = self.root.join(alert_id.to_string());
      tokio::fs::create_dir_all(&dir).await?;
      tokio::fs::write(dir.join(&name), &photo.data).await?;

      tracing::debug!(%alert_id, position, file = %name, "evidence stored");
      Ok(format!("{alert_id}/{name}"))
    }
  }
}
