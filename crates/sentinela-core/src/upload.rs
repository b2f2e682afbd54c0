//! The evidence upload collaborator: turns raw photo bytes into a durable
//! reference. The core stores only what this returns.

use std::future::Future;

use uuid::Uuid;

use crate::alert::PhotoUpload;

pub trait EvidenceUploader: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `photo` as the `position`-th piece of evidence for `alert_id`
  /// and return its durable reference (URL or id).
  fn upload(
    &self,
    alert_id: Uuid,
    position: u32,
    photo: PhotoUpload,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}
