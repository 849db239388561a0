//! Core types and pure derivations for the Stride progress engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. Every
//! derived value (progress percentage, streaks, points, level, badges) is
//! computed by a pure function here, so the live sync path and the batch
//! reconciliation path cannot drift apart.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod completion;
pub mod enrollment;
pub mod error;
pub mod points;
pub mod profile;
pub mod programme;
pub mod progress;
pub mod store;
pub mod streak;

pub use error::{Entity, Error, Result};
