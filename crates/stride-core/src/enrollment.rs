//! Enrollment: one student's relationship to one programme.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnrollmentStatus {
  Enrolled,
  Active,
  Completed,
  Paused,
  Cancelled,
  Expired,
}

impl EnrollmentStatus {
  /// Cancelled and expired enrollments reject new completion events.
  pub fn accepts_activity(self) -> bool {
    !matches!(self, Self::Cancelled | Self::Expired)
  }

  /// Whether the enrollment counts towards "courses enrolled".
  pub fn is_counted(self) -> bool { self != Self::Cancelled }
}

// ─── Progress block ──────────────────────────────────────────────────────────

/// Progress within one programme. Sets are ordered so that serialised output
/// is stable across recomputations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBlock {
  pub completed_lessons:  BTreeSet<Uuid>,
  pub completed_modules:  BTreeSet<Uuid>,
  /// Never decreases.
  pub time_spent_minutes: u64,
  pub last_activity_at:   Option<DateTime<Utc>>,
  /// 0–100, always derived via [`crate::progress::percentage`].
  pub percentage:         u8,
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
  pub student_id:   Uuid,
  pub programme_id: Uuid,
  pub status:       EnrollmentStatus,
  pub enrolled_at:  DateTime<Utc>,
  /// Set exactly once, when the percentage first reaches 100.
  pub completed_at: Option<DateTime<Utc>>,
  pub progress:     ProgressBlock,
}

impl Enrollment {
  pub fn new(student_id: Uuid, programme_id: Uuid, at: DateTime<Utc>) -> Self {
    Self {
      student_id,
      programme_id,
      status: EnrollmentStatus::Enrolled,
      enrolled_at: at,
      completed_at: None,
      progress: ProgressBlock::default(),
    }
  }

  /// Fail with [`Error::InvalidState`] unless the enrollment can make
  /// progress.
  pub fn ensure_accepts_activity(&self) -> Result<()> {
    if self.status.accepts_activity() {
      Ok(())
    } else {
      Err(Error::InvalidState(format!(
        "enrollment of student {} in programme {} is {}",
        self.student_id, self.programme_id, self.status
      )))
    }
  }

  /// Record activity on a lesson: adds the lesson to the completed set,
  /// accumulates time and wakes an enrolled or paused enrollment.
  ///
  /// Returns `true` if the lesson was not already in the completed set.
  pub fn record_lesson(
    &mut self,
    lesson_id: Uuid,
    minutes: u32,
    at: DateTime<Utc>,
  ) -> bool {
    let inserted = self.progress.completed_lessons.insert(lesson_id);
    self.progress.time_spent_minutes += u64::from(minutes);
    self.progress.last_activity_at =
      Some(self.progress.last_activity_at.map_or(at, |prev| prev.max(at)));
    if matches!(self.status, EnrollmentStatus::Enrolled | EnrollmentStatus::Paused) {
      self.status = EnrollmentStatus::Active;
    }
    inserted
  }

  /// Store a freshly computed percentage and fire the one-way completion
  /// transition if it just reached 100.
  ///
  /// Returns `true` only on the call that performs the transition. A
  /// completed enrollment is never reverted, whatever the percentage, and an
  /// enrollment re-opened at 100% stays open until its percentage drops and
  /// climbs back.
  pub fn apply_percentage(&mut self, percentage: u8, now: DateTime<Utc>) -> bool {
    let previous = std::mem::replace(&mut self.progress.percentage, percentage);
    if percentage < 100
      || previous >= 100
      || self.status == EnrollmentStatus::Completed
      || !self.status.accepts_activity()
    {
      return false;
    }
    self.status = EnrollmentStatus::Completed;
    if self.completed_at.is_none() {
      self.completed_at = Some(now);
    }
    true
  }

  /// Apply an externally requested status change.
  ///
  /// Completion is reserved for the progress transition. Re-opening a
  /// completed enrollment clears `completed_at`.
  pub fn set_status(&mut self, status: EnrollmentStatus) -> Result<()> {
    if status == EnrollmentStatus::Completed && self.status != status {
      return Err(Error::InvalidState(
        "an enrollment is completed only by reaching 100% progress".into(),
      ));
    }
    if self.status == EnrollmentStatus::Completed && status != self.status {
      self.completed_at = None;
    }
    self.status = status;
    Ok(())
  }
}
