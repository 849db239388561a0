//! Handlers for `/jobs` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/jobs` | Status of every reconciliation job |
//! | `POST` | `/jobs/:name/run` | Runs the job now; 409 if it is already running |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use stride_core::store::ProgressStore;
use stride_engine::{JobKind, JobReport, JobStatus};

use crate::{AppState, error::ApiError};

/// `GET /jobs`
pub async fn list<S>(State(state): State<Arc<AppState<S>>>) -> Json<Vec<JobStatus>>
where
  S: ProgressStore + 'static,
{
  Json(state.scheduler.status())
}

/// `POST /jobs/:name/run`, where `name` is e.g. `weekly-cleanup`.
pub async fn run<S>(
  State(state): State<Arc<AppState<S>>>,
  Path(name): Path<String>,
) -> Result<Json<JobReport>, ApiError>
where
  S: ProgressStore + 'static,
{
  let job: JobKind = name
    .parse()
    .map_err(|_| ApiError::NotFound(format!("job {name}")))?;
  Ok(Json(state.scheduler.trigger(job).await?))
}
