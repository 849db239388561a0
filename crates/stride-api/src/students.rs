use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use stride_core::store::ProgressStore;
use stride_engine::DashboardSnapshot;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /students/:student_id/dashboard`
pub async fn dashboard<S>(
  State(state): State<Arc<AppState<S>>>,
  Path(student_id): Path<Uuid>,
) -> Result<Json<DashboardSnapshot>, ApiError>
where
  S: ProgressStore + 'static,
{
  Ok(Json(state.dashboard.snapshot(student_id).await?))
}
