//! Handlers for `/enrollments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/enrollments` | Body: [`EnrollBody`]; returns 201 + the enrollment |
//! | `PUT`  | `/enrollments/:student_id/:programme_id/status` | Body: `{"status":"paused"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use stride_core::{
  enrollment::{Enrollment, EnrollmentStatus},
  store::ProgressStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
  pub student_id:   Uuid,
  pub programme_id: Uuid,
}

/// `POST /enrollments`
pub async fn create<S>(
  State(state): State<Arc<AppState<S>>>,
  Json(body): Json<EnrollBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProgressStore + 'static,
{
  let enrollment = state.sync.enroll(body.student_id, body.programme_id).await?;
  Ok((StatusCode::CREATED, Json(enrollment)))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: EnrollmentStatus,
}

/// `PUT /enrollments/:student_id/:programme_id/status`
pub async fn set_status<S>(
  State(state): State<Arc<AppState<S>>>,
  Path((student_id, programme_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Enrollment>, ApiError>
where
  S: ProgressStore + 'static,
{
  let enrollment = state
    .sync
    .set_enrollment_status(student_id, programme_id, body.status)
    .await?;
  Ok(Json(enrollment))
}
