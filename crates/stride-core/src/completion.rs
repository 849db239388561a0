//! Completion records: one row per (student, lesson).
//!
//! A record is immutable in identity: re-completing a lesson updates the
//! existing record (time spent, timestamp, best quiz score) instead of
//! appending a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// A quiz result as submitted: `score` out of `max_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
  pub score:     u32,
  pub max_score: u32,
}

impl QuizScore {
  pub fn new(score: u32, max_score: u32) -> Result<Self> {
    if max_score == 0 {
      return Err(Error::InvalidInput("quiz max score must be positive".into()));
    }
    if score > max_score {
      return Err(Error::InvalidInput(format!(
        "quiz score {score} exceeds max score {max_score}"
      )));
    }
    Ok(Self { score, max_score })
  }

  /// Score as a percentage in `[0, 100]`.
  pub fn percentage(&self) -> f64 {
    if self.max_score == 0 {
      return 0.0;
    }
    f64::from(self.score) * 100.0 / f64::from(self.max_score)
  }

  /// The better of two attempts, by percentage.
  pub fn best(self, other: Self) -> Self {
    if other.percentage() > self.percentage() { other } else { self }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
  pub student_id:         Uuid,
  pub lesson_id:          Uuid,
  pub module_id:          Uuid,
  pub programme_id:       Uuid,
  /// Refreshed on every re-completion.
  pub completed_at:       DateTime<Utc>,
  /// Accumulated over every submission.
  pub time_spent_minutes: u64,
  pub quiz:               Option<QuizScore>,
}

impl CompletionRecord {
  /// Fold a re-submission into this record.
  pub fn resubmit(
    &mut self,
    minutes: u32,
    quiz: Option<QuizScore>,
    at: DateTime<Utc>,
  ) {
    self.time_spent_minutes += u64::from(minutes);
    self.completed_at = at;
    self.quiz = match (self.quiz, quiz) {
      (Some(prev), Some(next)) => Some(prev.best(next)),
      (prev, next) => next.or(prev),
    };
  }
}
