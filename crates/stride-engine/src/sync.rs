//! Sync Orchestrator: the only entry point for live completion events.
//!
//! Each event runs as one unit of work inside a single store transaction:
//! record → progress → streak → points/level → badges/statistics → persist.
//! If any step fails nothing is written. Reads are bounded: no step scans a
//! student's full history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stride_core::{
  Entity, Error, Result,
  clock::Clock,
  completion::QuizScore,
  enrollment::{Enrollment, EnrollmentStatus},
  points::{self, Badge},
  profile::StudentProfile,
  store::{Ledger, ProgressStore},
  streak::{self, Streak},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
  aggregator::{self, ProgressSummary},
  recorder::{self, CompletionInput},
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointsSummary {
  pub total:      u64,
  pub level:      u32,
  /// Points added by this event; 0 for a plain re-submission.
  pub awarded:    u64,
  pub new_badges: Vec<Badge>,
}

/// What a caller gets back for immediate display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
  pub progress: ProgressSummary,
  pub streak:   Streak,
  pub points:   PointsSummary,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct SyncService<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: ProgressStore> SyncService<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Record a lesson completion and update every aggregate it affects.
  pub async fn record_completion_and_sync(
    &self,
    student_id: Uuid,
    programme_id: Uuid,
    module_id: Uuid,
    lesson_id: Uuid,
    time_spent_minutes: u32,
  ) -> Result<SyncOutcome> {
    self
      .sync(CompletionInput {
        student_id,
        programme_id,
        module_id: Some(module_id),
        lesson_id,
        time_spent_minutes,
        quiz: None,
      })
      .await
  }

  /// Record a quiz submission. The module is taken from the lesson catalog.
  pub async fn record_quiz_and_sync(
    &self,
    student_id: Uuid,
    programme_id: Uuid,
    lesson_id: Uuid,
    score: u32,
    max_score: u32,
    time_spent_minutes: u32,
  ) -> Result<SyncOutcome> {
    let quiz = QuizScore::new(score, max_score)?;
    self
      .sync(CompletionInput {
        student_id,
        programme_id,
        module_id: None,
        lesson_id,
        time_spent_minutes,
        quiz: Some(quiz),
      })
      .await
  }

  async fn sync(&self, input: CompletionInput) -> Result<SyncOutcome> {
    let now = self.clock.now();
    let student_id = input.student_id;
    let lesson_id = input.lesson_id;
    let outcome = self
      .store
      .transact(move |ledger| sync_unit(ledger, &input, now))
      .await?;
    debug!(
      %student_id,
      %lesson_id,
      percentage = outcome.progress.percentage,
      streak = outcome.streak.current,
      awarded = outcome.points.awarded,
      "completion synced"
    );
    Ok(outcome)
  }

  /// Enroll a student in a programme. Enrolling again is a no-op unless the
  /// previous enrollment was cancelled or expired, in which case it is
  /// renewed with its progress intact.
  pub async fn enroll(&self, student_id: Uuid, programme_id: Uuid) -> Result<Enrollment> {
    let now = self.clock.now();
    self
      .store
      .transact(move |ledger| {
        if ledger.programme(programme_id)?.is_none() {
          return Err(Error::not_found(Entity::Programme, programme_id));
        }
        let enrollment = match ledger.enrollment(student_id, programme_id)? {
          Some(existing) if existing.status.accepts_activity() => return Ok(existing),
          Some(mut lapsed) => {
            lapsed.set_status(EnrollmentStatus::Enrolled)?;
            lapsed
          }
          None => Enrollment::new(student_id, programme_id, now),
        };
        ledger.put_enrollment(&enrollment)?;
        refresh_statistics(ledger, student_id)?;
        Ok(enrollment)
      })
      .await
  }

  /// Apply a status change requested by an external actor (pause, cancel,
  /// expire, re-open).
  pub async fn set_enrollment_status(
    &self,
    student_id: Uuid,
    programme_id: Uuid,
    status: EnrollmentStatus,
  ) -> Result<Enrollment> {
    self
      .store
      .transact(move |ledger| {
        let mut enrollment = ledger
          .enrollment(student_id, programme_id)?
          .ok_or_else(|| enrollment_not_found(student_id, programme_id))?;
        enrollment.set_status(status)?;
        ledger.put_enrollment(&enrollment)?;
        refresh_statistics(ledger, student_id)?;
        Ok(enrollment)
      })
      .await
  }
}

fn enrollment_not_found(student_id: Uuid, programme_id: Uuid) -> Error {
  Error::not_found(Entity::Enrollment, format!("{student_id}/{programme_id}"))
}

fn refresh_statistics(ledger: &mut dyn Ledger, student_id: Uuid) -> Result<()> {
  let mut profile = ledger
    .profile(student_id)?
    .unwrap_or_else(|| StudentProfile::new(student_id));
  profile.apply_enrollments(&ledger.enrollments(student_id)?);
  profile.award_badges();
  ledger.put_profile(&profile)
}

/// One live-path unit of work. Runs inside the store transaction.
fn sync_unit(
  ledger: &mut dyn Ledger,
  input: &CompletionInput,
  now: DateTime<Utc>,
) -> Result<SyncOutcome> {
  let student_id = input.student_id;
  let mut enrollment = ledger
    .enrollment(student_id, input.programme_id)?
    .ok_or_else(|| enrollment_not_found(student_id, input.programme_id))?;
  enrollment.ensure_accepts_activity()?;

  // Completion record.
  let recorded = recorder::record_completion(ledger, input, now)?;

  // Progress.
  enrollment.record_lesson(input.lesson_id, input.time_spent_minutes, now);
  let progress =
    aggregator::refresh_progress(&*ledger, &recorded.programme, &mut enrollment, now)?;
  ledger.put_enrollment(&enrollment)?;

  // Streak. The current run plus today and one gap day is all the history
  // the walk needs.
  let mut profile = ledger
    .profile(student_id)?
    .unwrap_or_else(|| StudentProfile::new(student_id));
  let lookback = profile.gamification.streak.current as usize + 2;
  let days = ledger.recent_activity_days(student_id, lookback)?;
  profile.apply_streak(streak::compute(days, now.date_naive()));
  profile.mark_active(now.date_naive());

  // Points and level. A lesson whose old record was pruned keeps its
  // archived credit, so only an improvement on it is awarded.
  let credited = profile
    .gamification
    .credited_for(input.lesson_id, recorded.previous.as_ref());
  let awarded = points::record_points(&recorded.record).saturating_sub(credited);
  profile.set_points(profile.gamification.total_points + awarded);

  // Statistics and badges.
  profile.apply_enrollments(&ledger.enrollments(student_id)?);
  let new_badges = profile.award_badges();
  ledger.put_profile(&profile)?;

  Ok(SyncOutcome {
    progress,
    streak: profile.gamification.streak,
    points: PointsSummary {
      total: profile.gamification.total_points,
      level: profile.gamification.level,
      awarded,
      new_badges: new_badges.into_iter().collect(),
    },
  })
}
