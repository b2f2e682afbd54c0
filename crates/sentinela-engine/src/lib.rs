//! The Sentinela alert engine: identity registration, quota and dedup
//! checks, the alert lifecycle, and live listings.
//!
//! Everything here is generic over [`sentinela_core::store::AlertStore`] and
//! treats it as a remote store; no state is shared between callers except
//! through it.
//!
//! # Usage
//!
//! ```rust,ignore
//! let engine = Engine::new(Arc::new(store), Arc::new(uploader), Policy::default());
//! let receipt = engine.submit(submission).await?;
//! let mut live = engine.subscribe(AlertFilter::ACTIVE_24H);
//! while let Some(state) = live.changed().await { /* render */ }
//! ```

pub mod dedup;
pub mod engine;
pub mod identities;
pub mod manager;
pub mod quota;
pub mod sync;
pub mod view;

#[cfg(test)]
mod fixtures;

pub use engine::{Engine, Receipt, Submission};
pub use manager::{Created, EvidenceFailure, LifecycleManager};
pub use sync::{Snapshot, Subscription, SyncBroadcaster, SyncState};
pub use view::{AlertFilter, AlertStats, Listing};
