//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Engine(#[from] stride_core::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use stride_core::Error as E;
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Engine(err) => match err {
        E::NotFound { .. } => StatusCode::NOT_FOUND,
        E::InvalidState(_) | E::JobAlreadyRunning(_) => StatusCode::CONFLICT,
        E::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
