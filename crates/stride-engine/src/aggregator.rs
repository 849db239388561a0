//! Progress Aggregator: recomputes an enrollment's percentage and fires the
//! one-way completion transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use stride_core::{
  Result,
  enrollment::{Enrollment, EnrollmentStatus},
  programme::Programme,
  progress,
  store::Ledger,
};
use uuid::Uuid;

/// The progress values returned to callers after an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
  pub programme_id:      Uuid,
  pub percentage:        u8,
  pub status:            EnrollmentStatus,
  pub completed_lessons: usize,
  pub total_lessons:     u32,
  /// True only on the update that completed the enrollment.
  pub newly_completed:   bool,
}

/// Recompute `enrollment`'s completed modules and percentage from its
/// completed-lesson set, against the programme's lesson count.
///
/// The caller persists the enrollment. A completed enrollment is never
/// reverted here, whatever the recomputed percentage.
pub fn refresh_progress(
  ledger: &dyn Ledger,
  programme: &Programme,
  enrollment: &mut Enrollment,
  now: DateTime<Utc>,
) -> Result<ProgressSummary> {
  let lessons = ledger.programme_lessons(programme.programme_id)?;
  let modules =
    progress::completed_modules(&lessons, &enrollment.progress.completed_lessons);
  enrollment.progress.completed_modules.extend(modules);

  let completed = enrollment.progress.completed_lessons.len();
  let percentage = progress::percentage(completed, programme.total_lessons);
  let newly_completed = enrollment.apply_percentage(percentage, now);

  Ok(ProgressSummary {
    programme_id: programme.programme_id,
    percentage,
    status: enrollment.status,
    completed_lessons: completed,
    total_lessons: programme.total_lessons,
    newly_completed,
  })
}
