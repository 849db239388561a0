//! SQLite backend for the Stride progress store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each unit of work runs inside one
//! `BEGIN IMMEDIATE` transaction, which serialises concurrent writers.

mod encode;
mod ledger;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
