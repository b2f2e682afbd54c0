//! Core types and trait definitions for the Sentinela flood-alert engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain model, the pure lifecycle rules, and the seams (repository,
//! change feed, evidence upload, clock) that the engine is written against.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alert;
pub mod changes;
pub mod clock;
pub mod error;
pub mod geo;
pub mod identity;
pub mod lifecycle;
pub mod memory;
pub mod policy;
pub mod store;
pub mod upload;

pub use error::{Error, Result};
