//! The Stride synchronization engine.
//!
//! Two paths write the same aggregates:
//!
//! - the live path, [`sync::SyncService`], runs one transaction per
//!   completion event;
//! - the batch path, [`reconcile::Reconciler`] driven by
//!   [`scheduler::Scheduler`], recomputes aggregates from source records one
//!   student at a time.
//!
//! Both call the same pure derivations in `stride_core`, and every service is
//! built once with its store and clock injected.

pub mod aggregator;
pub mod cadence;
pub mod dashboard;
pub mod recorder;
pub mod reconcile;
pub mod scheduler;
pub mod sync;

pub use dashboard::{CourseProgress, Dashboard, DashboardSnapshot};
pub use reconcile::{JobKind, JobReport, ReconcileSettings, Reconciler};
pub use scheduler::{JobState, JobStatus, Schedule, Scheduler};
pub use sync::{SyncOutcome, SyncService};

#[cfg(test)]
mod tests;
