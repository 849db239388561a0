//! Completion Recorder: the idempotent upsert of one completion record.

use chrono::{DateTime, Utc};
use stride_core::{
  Entity, Error, Result,
  completion::{CompletionRecord, QuizScore},
  programme::{Lesson, Programme},
  store::Ledger,
};
use uuid::Uuid;

/// A completion event as submitted by a caller.
#[derive(Debug, Clone)]
pub struct CompletionInput {
  pub student_id:         Uuid,
  pub programme_id:       Uuid,
  /// When absent the module is taken from the lesson catalog.
  pub module_id:          Option<Uuid>,
  pub lesson_id:          Uuid,
  pub time_spent_minutes: u32,
  pub quiz:               Option<QuizScore>,
}

/// The record after the upsert, and the record as it was before (if any).
#[derive(Debug, Clone)]
pub struct Recorded {
  pub programme: Programme,
  pub lesson:    Lesson,
  pub record:    CompletionRecord,
  pub previous:  Option<CompletionRecord>,
}

impl Recorded {
  pub fn is_first_completion(&self) -> bool { self.previous.is_none() }
}

/// Ensure exactly one record exists for `(student, lesson)`.
///
/// Re-submission adds the time spent and refreshes `completed_at` on the
/// existing record. Fails with `NotFound` if the programme or lesson is
/// unknown, or if the lesson is not part of the given programme and module,
/// and with `InvalidInput` if a quiz score is missing for a quiz lesson or
/// given for any other lesson.
pub fn record_completion(
  ledger: &mut dyn Ledger,
  input: &CompletionInput,
  now: DateTime<Utc>,
) -> Result<Recorded> {
  let programme = ledger
    .programme(input.programme_id)?
    .ok_or_else(|| Error::not_found(Entity::Programme, input.programme_id))?;

  let lesson = ledger
    .lesson(input.lesson_id)
    .map(|found| {
      found.filter(|l| {
        l.programme_id == input.programme_id
          && input.module_id.is_none_or(|m| m == l.module_id)
      })
    })?
    .ok_or_else(|| {
      let module = input.module_id.map_or("-".to_owned(), |m| m.to_string());
      Error::not_found(
        Entity::Lesson,
        format!("{} in programme {} module {module}", input.lesson_id, input.programme_id),
      )
    })?;

  match (lesson.is_quiz, input.quiz.is_some()) {
    (true, false) => {
      return Err(Error::InvalidInput(format!(
        "lesson {} is a quiz and needs a score",
        lesson.lesson_id
      )));
    }
    (false, true) => {
      return Err(Error::InvalidInput(format!(
        "lesson {} is not a quiz and takes no score",
        lesson.lesson_id
      )));
    }
    _ => {}
  }

  let previous = ledger.completion(input.student_id, input.lesson_id)?;
  let record = match previous.clone() {
    Some(mut existing) => {
      existing.resubmit(input.time_spent_minutes, input.quiz, now);
      existing
    }
    None => CompletionRecord {
      student_id:         input.student_id,
      lesson_id:          lesson.lesson_id,
      module_id:          lesson.module_id,
      programme_id:       programme.programme_id,
      completed_at:       now,
      time_spent_minutes: u64::from(input.time_spent_minutes),
      quiz:               input.quiz,
    },
  };
  ledger.put_completion(&record)?;

  Ok(Recorded { programme, lesson, record, previous })
}
