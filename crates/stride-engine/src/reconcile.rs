//! Reconciliation jobs: recompute aggregates from source records.
//!
//! Every job walks its students sequentially and gives each one its own
//! transaction. A failing student is logged and skipped; the job carries on.
//! Because each step recomputes from source records and merges with the
//! monotone rules (longest streak, completion status, completed lessons, last
//! activity only move forward), running a job twice in a row writes the same
//! aggregates twice.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use stride_core::{
  Entity, Error, Result,
  clock::Clock,
  completion::CompletionRecord,
  enrollment::Enrollment,
  points,
  profile::StudentProfile,
  store::{Ledger, ProgressStore},
  streak,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator;

// ─── Jobs ────────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobKind {
  DailyReconciliation,
  HourlyStreakRefresh,
  WeeklyCleanup,
  MonthlyFullRecalculation,
}

/// Summary of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
  pub job:                JobKind,
  pub students_processed: u64,
  pub students_skipped:   u64,
  pub records_pruned:     u64,
  pub started_at:         DateTime<Utc>,
  pub finished_at:        DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
  /// Students with a completion in this many trailing days are "active".
  pub active_window_days: u32,
  /// Completion records older than this many days are pruned weekly.
  pub retention_days:     u32,
}

impl Default for ReconcileSettings {
  fn default() -> Self { Self { active_window_days: 30, retention_days: 180 } }
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

pub struct Reconciler<S> {
  store:    Arc<S>,
  clock:    Arc<dyn Clock>,
  settings: ReconcileSettings,
}

impl<S: ProgressStore> Reconciler<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: ReconcileSettings) -> Self {
    Self { store, clock, settings }
  }

  pub async fn run(&self, job: JobKind) -> Result<JobReport> {
    match job {
      JobKind::DailyReconciliation => self.run_daily_reconciliation().await,
      JobKind::HourlyStreakRefresh => self.run_hourly_streak_refresh().await,
      JobKind::WeeklyCleanup => self.run_weekly_cleanup().await,
      JobKind::MonthlyFullRecalculation => self.run_monthly_full_recalculation().await,
    }
  }

  /// Streak, points, progress and statistics for recently active students.
  pub async fn run_daily_reconciliation(&self) -> Result<JobReport> {
    let students = self.store.active_students(self.active_since()).await?;
    self
      .for_each_student(JobKind::DailyReconciliation, students, recalculate_student)
      .await
  }

  /// Streak only, for recently active students, so current streaks decay
  /// after a missed day.
  pub async fn run_hourly_streak_refresh(&self) -> Result<JobReport> {
    let students = self.store.active_students(self.active_since()).await?;
    self
      .for_each_student(JobKind::HourlyStreakRefresh, students, refresh_streak)
      .await
  }

  /// Prune completion records older than the retention window.
  pub async fn run_weekly_cleanup(&self) -> Result<JobReport> {
    let cutoff = self.clock.now() - Duration::days(i64::from(self.settings.retention_days));
    let students = self.store.students_with_completions_before(cutoff).await?;
    self
      .for_each_student(JobKind::WeeklyCleanup, students, move |ledger, student_id, now| {
        prune_student(ledger, student_id, cutoff, now)
      })
      .await
  }

  /// The daily recomputation, for every known student.
  pub async fn run_monthly_full_recalculation(&self) -> Result<JobReport> {
    let students = self.store.all_students().await?;
    self
      .for_each_student(JobKind::MonthlyFullRecalculation, students, recalculate_student)
      .await
  }

  fn active_since(&self) -> DateTime<Utc> {
    self.clock.now() - Duration::days(i64::from(self.settings.active_window_days))
  }

  /// Run `work` once per student, each in its own transaction. `work`
  /// returns the number of records it pruned.
  async fn for_each_student<F>(
    &self,
    job: JobKind,
    students: Vec<Uuid>,
    work: F,
  ) -> Result<JobReport>
  where
    F: Fn(&mut dyn Ledger, Uuid, DateTime<Utc>) -> Result<u64> + Clone + Send + 'static,
  {
    let started_at = self.clock.now();
    info!(job = %job, students = students.len(), "reconciliation job started");

    let mut report = JobReport {
      job,
      students_processed: 0,
      students_skipped: 0,
      records_pruned: 0,
      started_at,
      finished_at: started_at,
    };

    for student_id in students {
      let now = self.clock.now();
      let work = work.clone();
      match self.store.transact(move |ledger| work(ledger, student_id, now)).await {
        Ok(pruned) => {
          report.students_processed += 1;
          report.records_pruned += pruned;
        }
        Err(source) => {
          let skipped = Error::ComputationSkipped {
            job: job.to_string(),
            student_id,
            source: Box::new(source),
          };
          warn!(%student_id, job = %job, error = %skipped, "student skipped");
          report.students_skipped += 1;
        }
      }
    }

    report.finished_at = self.clock.now();
    info!(
      job = %job,
      processed = report.students_processed,
      skipped = report.students_skipped,
      pruned = report.records_pruned,
      "reconciliation job finished"
    );
    Ok(report)
  }
}

// ─── Per-student steps ───────────────────────────────────────────────────────

/// Recompute every aggregate of one student from their completion records.
pub fn recalculate_student(
  ledger: &mut dyn Ledger,
  student_id: Uuid,
  now: DateTime<Utc>,
) -> Result<u64> {
  let records = ledger.completions(student_id)?;
  let mut profile = ledger
    .profile(student_id)?
    .unwrap_or_else(|| StudentProfile::new(student_id));

  let days = streak::activity_days(records.iter().map(|r| r.completed_at));
  if let Some(&last) = days.iter().max() {
    profile.mark_active(last);
  }
  profile.apply_streak(streak::compute(days, now.date_naive()));

  let mut enrollments = ledger.enrollments(student_id)?;
  for enrollment in &mut enrollments {
    let before = enrollment.clone();
    reconcile_enrollment(&*ledger, enrollment, &records, now)?;
    if *enrollment != before {
      ledger.put_enrollment(enrollment)?;
    }
  }

  let total = points::credited_points(&profile.gamification.archived_lessons, &records);
  profile.set_points(total);
  profile.apply_enrollments(&enrollments);
  profile.award_badges();
  ledger.put_profile(&profile)?;
  Ok(0)
}

/// Fold a student's retained records into one enrollment, then recompute
/// its percentage.
fn reconcile_enrollment(
  ledger: &dyn Ledger,
  enrollment: &mut Enrollment,
  records: &[CompletionRecord],
  now: DateTime<Utc>,
) -> Result<()> {
  let programme = ledger
    .programme(enrollment.programme_id)?
    .ok_or_else(|| Error::not_found(Entity::Programme, enrollment.programme_id))?;

  let mut minutes = 0u64;
  let mut last_activity = enrollment.progress.last_activity_at;
  for record in records.iter().filter(|r| r.programme_id == enrollment.programme_id) {
    enrollment.progress.completed_lessons.insert(record.lesson_id);
    minutes += record.time_spent_minutes;
    last_activity = Some(last_activity.map_or(record.completed_at, |t| t.max(record.completed_at)));
  }
  let progress = &mut enrollment.progress;
  progress.time_spent_minutes = progress.time_spent_minutes.max(minutes);
  progress.last_activity_at = last_activity;

  aggregator::refresh_progress(ledger, &programme, enrollment, now)?;
  Ok(())
}

/// Recompute only the streak block of one student.
pub fn refresh_streak(
  ledger: &mut dyn Ledger,
  student_id: Uuid,
  now: DateTime<Utc>,
) -> Result<u64> {
  let Some(mut profile) = ledger.profile(student_id)? else {
    return Ok(0);
  };
  let days = ledger.recent_activity_days(student_id, usize::MAX)?;
  profile.apply_streak(streak::compute(days, now.date_naive()));
  profile.award_badges();
  ledger.put_profile(&profile)?;
  Ok(0)
}

/// Delete one student's records older than `cutoff`.
///
/// Before anything is deleted, the full-history streak is merged into the
/// profile and the pruned records' points are archived per lesson, so later
/// recomputations cannot regress either value and a re-completed lesson is
/// not credited twice.
pub fn prune_student(
  ledger: &mut dyn Ledger,
  student_id: Uuid,
  cutoff: DateTime<Utc>,
  now: DateTime<Utc>,
) -> Result<u64> {
  let mut profile = ledger
    .profile(student_id)?
    .unwrap_or_else(|| StudentProfile::new(student_id));
  let days = ledger.recent_activity_days(student_id, usize::MAX)?;
  profile.apply_streak(streak::compute(days, now.date_naive()));

  let pruned = ledger.prune_completions(student_id, cutoff)?;
  profile.gamification.archive(&pruned);
  ledger.put_profile(&profile)?;
  Ok(pruned.len() as u64)
}
