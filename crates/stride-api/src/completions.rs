//! Handlers for completion events. Both return the [`SyncOutcome`] so the
//! client can update its display without a second request.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Deserialize;
use stride_core::store::ProgressStore;
use stride_engine::SyncOutcome;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CompletionBody {
  pub student_id:         Uuid,
  pub programme_id:       Uuid,
  pub module_id:          Uuid,
  pub lesson_id:          Uuid,
  #[serde(default)]
  pub time_spent_minutes: u32,
}

/// `POST /completions`
pub async fn record_completion<S>(
  State(state): State<Arc<AppState<S>>>,
  Json(body): Json<CompletionBody>,
) -> Result<Json<SyncOutcome>, ApiError>
where
  S: ProgressStore + 'static,
{
  let outcome = state
    .sync
    .record_completion_and_sync(
      body.student_id,
      body.programme_id,
      body.module_id,
      body.lesson_id,
      body.time_spent_minutes,
    )
    .await?;
  Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct QuizBody {
  pub student_id:         Uuid,
  pub programme_id:       Uuid,
  pub lesson_id:          Uuid,
  pub score:              u32,
  pub max_score:          u32,
  #[serde(default)]
  pub time_spent_minutes: u32,
}

/// `POST /quizzes`
pub async fn record_quiz<S>(
  State(state): State<Arc<AppState<S>>>,
  Json(body): Json<QuizBody>,
) -> Result<Json<SyncOutcome>, ApiError>
where
  S: ProgressStore + 'static,
{
  let outcome = state
    .sync
    .record_quiz_and_sync(
      body.student_id,
      body.programme_id,
      body.lesson_id,
      body.score,
      body.max_score,
      body.time_spent_minutes,
    )
    .await?;
  Ok(Json(outcome))
}
