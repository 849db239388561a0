//! Read-only dashboard projection assembled from current aggregate state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stride_core::{
  Result,
  clock::Clock,
  enrollment::EnrollmentStatus,
  points::Badge,
  profile::StudentProfile,
  progress,
  store::ProgressStore,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
  pub programme_id:       Uuid,
  pub title:              String,
  pub status:             EnrollmentStatus,
  pub percentage:         u8,
  pub completed_lessons:  usize,
  pub total_lessons:      u32,
  pub time_spent_minutes: u64,
  pub last_activity_at:   Option<DateTime<Utc>>,
  pub completed_at:       Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
  pub student_id:          Uuid,
  pub enrolled_count:      u32,
  pub average_progress:    u8,
  pub total_hours_learned: f64,
  /// Zero once the last active day is before yesterday, even if the stored
  /// value has not been refreshed yet.
  pub current_streak:      u32,
  pub longest_streak:      u32,
  pub total_points:        u64,
  pub level:               u32,
  pub badges:              Vec<Badge>,
  pub courses:             Vec<CourseProgress>,
}

pub struct Dashboard<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: ProgressStore> Dashboard<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Build the snapshot for `student_id`. Never writes.
  ///
  /// A student with no recorded activity gets an empty snapshot at level 1.
  pub async fn snapshot(&self, student_id: Uuid) -> Result<DashboardSnapshot> {
    let today = self.clock.today();
    self
      .store
      .read(move |ledger| {
        let profile = ledger
          .profile(student_id)?
          .unwrap_or_else(|| StudentProfile::new(student_id));

        let mut courses = Vec::new();
        for enrollment in ledger.enrollments(student_id)? {
          if !enrollment.status.is_counted() {
            continue;
          }
          let programme = ledger.programme(enrollment.programme_id)?;
          courses.push(CourseProgress {
            programme_id:       enrollment.programme_id,
            title:              programme.as_ref().map(|p| p.title.clone()).unwrap_or_default(),
            status:             enrollment.status,
            percentage:         enrollment.progress.percentage,
            completed_lessons:  enrollment.progress.completed_lessons.len(),
            total_lessons:      programme.map_or(0, |p| p.total_lessons),
            time_spent_minutes: enrollment.progress.time_spent_minutes,
            last_activity_at:   enrollment.progress.last_activity_at,
            completed_at:       enrollment.completed_at,
          });
        }

        let streak = profile
          .gamification
          .streak
          .as_of(profile.statistics.last_active_date, today);

        Ok(DashboardSnapshot {
          student_id,
          enrolled_count: courses.len() as u32,
          average_progress: progress::average(courses.iter().map(|c| c.percentage)),
          total_hours_learned: profile.total_learning_hours(),
          current_streak: streak.current,
          longest_streak: streak.longest,
          total_points: profile.gamification.total_points,
          level: profile.gamification.level,
          badges: profile.gamification.badges.iter().copied().collect(),
          courses,
        })
      })
      .await
  }
}
