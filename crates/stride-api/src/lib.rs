//! JSON REST API for Stride.
//!
//! Exposes an axum [`Router`] backed by any [`ProgressStore`]. Handlers only
//! translate between HTTP and the engine services; every rule lives in
//! `stride-engine`.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", stride_api::api_router(state.clone()))
//! ```

pub mod completions;
pub mod enrollments;
pub mod error;
pub mod jobs;
pub mod students;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use stride_core::{clock::Clock, store::ProgressStore};
use stride_engine::{Dashboard, Scheduler, SyncService};

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub sync:      SyncService<S>,
  pub dashboard: Dashboard<S>,
  pub scheduler: Arc<Scheduler<S>>,
}

impl<S: ProgressStore + 'static> AppState<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, scheduler: Arc<Scheduler<S>>) -> Self {
    Self {
      sync: SyncService::new(store.clone(), clock.clone()),
      dashboard: Dashboard::new(store, clock),
      scheduler,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: Arc<AppState<S>>) -> Router<()>
where
  S: ProgressStore + 'static,
{
  Router::new()
    // Enrollments
    .route("/enrollments", post(enrollments::create::<S>))
    .route(
      "/enrollments/{student_id}/{programme_id}/status",
      put(enrollments::set_status::<S>),
    )
    // Completion events
    .route("/completions", post(completions::record_completion::<S>))
    .route("/quizzes", post(completions::record_quiz::<S>))
    // Read side
    .route("/students/{student_id}/dashboard", get(students::dashboard::<S>))
    // Reconciliation jobs
    .route("/jobs", get(jobs::list::<S>))
    .route("/jobs/{name}/run", post(jobs::run::<S>))
    .with_state(state)
}
