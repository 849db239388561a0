//! Error types for `stride-core`.
//!
//! This is the taxonomy shared by every layer. Storage backends convert their
//! driver errors into [`Error::TransientStorage`] or [`Error::Storage`] at the
//! trait boundary.

use thiserror::Error;
use uuid::Uuid;

/// The kind of record a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Entity {
  Student,
  Programme,
  Lesson,
  Enrollment,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found: {id}")]
  NotFound { entity: Entity, id: String },

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// A transaction conflict or connectivity problem. Safe to retry.
  #[error("transient storage failure: {0}")]
  TransientStorage(String),

  #[error("storage error: {0}")]
  Storage(String),

  /// One student's reconciliation step failed and was skipped.
  #[error("{job}: skipped student {student_id}: {source}")]
  ComputationSkipped {
    job:        String,
    student_id: Uuid,
    #[source]
    source:     Box<Error>,
  },

  #[error("job {0} is already running")]
  JobAlreadyRunning(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(entity: Entity, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }

  /// Whether the caller may retry the whole operation unchanged.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::TransientStorage(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
