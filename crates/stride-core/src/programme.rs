//! Programme catalog: read-only reference data for the engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A programme a student can enroll in. Supplies the denominator for the
/// progress percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
  pub programme_id:  Uuid,
  pub title:         String,
  pub total_lessons: u32,
  pub total_modules: u32,
}

/// A single lesson. Every lesson belongs to exactly one module of one
/// programme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
  pub lesson_id:    Uuid,
  pub programme_id: Uuid,
  pub module_id:    Uuid,
  pub title:        String,
  /// Quiz lessons carry a score on their completion record.
  #[serde(default)]
  pub is_quiz:      bool,
}
