//! End-to-end tests of the live sync path, reconciliation and the scheduler
//! against an in-memory `SqliteStore`.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use stride_core::{
  Error, Result,
  clock::{Clock, FixedClock},
  enrollment::{Enrollment, EnrollmentStatus},
  points::Badge,
  profile::StudentProfile,
  programme::{Lesson, Programme},
  store::{Ledger, ProgressStore},
  streak::Streak,
};
use stride_store_sqlite::SqliteStore;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
  Dashboard, JobKind, JobState, ReconcileSettings, Reconciler, Schedule, Scheduler,
  SyncOutcome, SyncService,
};

// ─── Harness ─────────────────────────────────────────────────────────────────

fn start() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() }

struct Course {
  programme: Programme,
  module_id: Uuid,
  lessons:   Vec<Lesson>,
}

/// A one-module course of `lessons` lessons; the indices in `quizzes` are
/// quiz lessons.
async fn add_course<S: ProgressStore>(
  store: &S,
  title: &str,
  lessons: usize,
  quizzes: &[usize],
) -> Course {
  let programme = Programme {
    programme_id:  Uuid::new_v4(),
    title:         title.into(),
    total_lessons: lessons as u32,
    total_modules: 1,
  };
  store.put_programme(programme.clone()).await.unwrap();
  let module_id = Uuid::new_v4();
  let mut out = Vec::new();
  for i in 0..lessons {
    let lesson = Lesson {
      lesson_id: Uuid::new_v4(),
      programme_id: programme.programme_id,
      module_id,
      title: format!("{title} {i}"),
      is_quiz: quizzes.contains(&i),
    };
    store.put_lesson(lesson.clone()).await.unwrap();
    out.push(lesson);
  }
  Course { programme, module_id, lessons: out }
}

struct Harness<S: ProgressStore = SqliteStore> {
  store:      Arc<S>,
  clock:      Arc<FixedClock>,
  sync:       SyncService<S>,
  reconciler: Arc<Reconciler<S>>,
  course:     Course,
}

async fn harness(lessons: usize) -> Harness { quiz_harness(lessons, &[]).await }

async fn quiz_harness(lessons: usize, quizzes: &[usize]) -> Harness {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  harness_with(store, lessons, quizzes).await
}

async fn harness_with<S: ProgressStore + 'static>(
  store: S,
  lessons: usize,
  quizzes: &[usize],
) -> Harness<S> {
  let store = Arc::new(store);
  let clock = Arc::new(FixedClock::new(start()));
  let dyn_clock: Arc<dyn Clock> = clock.clone();
  let course = add_course(&*store, "Rust for Beginners", lessons, quizzes).await;
  Harness {
    sync: SyncService::new(store.clone(), dyn_clock.clone()),
    reconciler: Arc::new(Reconciler::new(
      store.clone(),
      dyn_clock,
      ReconcileSettings::default(),
    )),
    store,
    clock,
    course,
  }
}

impl<S: ProgressStore + 'static> Harness<S> {
  fn dyn_clock(&self) -> Arc<dyn Clock> { self.clock.clone() }

  async fn enrolled_student(&self) -> Uuid {
    let student = Uuid::new_v4();
    self
      .sync
      .enroll(student, self.course.programme.programme_id)
      .await
      .unwrap();
    student
  }

  async fn complete(&self, student: Uuid, lesson: usize, minutes: u32) -> Result<SyncOutcome> {
    self
      .sync
      .record_completion_and_sync(
        student,
        self.course.programme.programme_id,
        self.course.module_id,
        self.course.lessons[lesson].lesson_id,
        minutes,
      )
      .await
  }

  async fn quiz(&self, student: Uuid, lesson: usize, score: u32) -> Result<SyncOutcome> {
    self
      .sync
      .record_quiz_and_sync(
        student,
        self.course.programme.programme_id,
        self.course.lessons[lesson].lesson_id,
        score,
        10,
        5,
      )
      .await
  }

  async fn profile(&self, student: Uuid) -> Option<StudentProfile> {
    self
      .store
      .read(move |ledger| ledger.profile(student))
      .await
      .unwrap()
  }

  async fn enrollment(&self, student: Uuid) -> Enrollment {
    let programme = self.course.programme.programme_id;
    self
      .store
      .read(move |ledger| ledger.enrollment(student, programme))
      .await
      .unwrap()
      .expect("enrollment exists")
  }

  async fn record_count(&self, student: Uuid) -> usize {
    self
      .store
      .read(move |ledger| Ok(ledger.completions(student)?.len()))
      .await
      .unwrap()
  }

  fn advance_days(&self, days: i64) { self.clock.advance(Duration::days(days)); }
}

// ─── Live path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_completion_updates_every_aggregate() {
  let h = harness(4).await;
  let student = h.enrolled_student().await;

  let outcome = h.complete(student, 0, 15).await.unwrap();
  assert_eq!(outcome.progress.percentage, 25);
  assert_eq!(outcome.progress.status, EnrollmentStatus::Active);
  assert!(!outcome.progress.newly_completed);
  assert_eq!(outcome.streak, Streak { current: 1, longest: 1 });
  assert_eq!(outcome.points.awarded, 10);
  assert_eq!(outcome.points.total, 10);
  assert_eq!(outcome.points.level, 1);
  assert_eq!(outcome.points.new_badges, vec![Badge::FirstLesson]);

  let profile = h.profile(student).await.unwrap();
  assert_eq!(profile.statistics.total_learning_minutes, 15);
  assert_eq!(profile.statistics.lessons_completed, 1);
  assert_eq!(profile.statistics.courses_enrolled, 1);
  assert_eq!(profile.statistics.last_active_date, Some(start().date_naive()));
}

#[tokio::test]
async fn resubmission_adds_time_but_no_points() {
  let h = harness(4).await;
  let student = h.enrolled_student().await;

  h.complete(student, 0, 15).await.unwrap();
  let again = h.complete(student, 0, 20).await.unwrap();

  assert_eq!(again.points.awarded, 0);
  assert_eq!(again.points.total, 10);
  assert_eq!(again.progress.percentage, 25);
  assert!(again.points.new_badges.is_empty());
  assert_eq!(h.record_count(student).await, 1);
  assert_eq!(h.enrollment(student).await.progress.time_spent_minutes, 35);
}

#[tokio::test]
async fn quiz_resubmission_keeps_the_best_score() {
  let h = quiz_harness(4, &[1]).await;
  let student = h.enrolled_student().await;

  let first = h.quiz(student, 1, 8).await.unwrap();
  assert_eq!(first.points.awarded, 18);

  let worse = h.quiz(student, 1, 6).await.unwrap();
  assert_eq!(worse.points.awarded, 0);
  assert_eq!(worse.points.total, 18);

  let better = h.quiz(student, 1, 10).await.unwrap();
  assert_eq!(better.points.awarded, 2);
  assert_eq!(better.points.total, 20);
}

#[tokio::test]
async fn invalid_quiz_score_is_rejected_before_any_write() {
  let h = quiz_harness(4, &[1]).await;
  let student = h.enrolled_student().await;

  let err = h.quiz(student, 1, 11).await.unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)), "{err}");
  assert_eq!(h.record_count(student).await, 0);
}

#[tokio::test]
async fn quiz_scores_only_fit_quiz_lessons() {
  let h = quiz_harness(2, &[1]).await;
  let student = h.enrolled_student().await;

  let err = h.quiz(student, 0, 9).await.unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)), "{err}");
  let err = h.complete(student, 1, 5).await.unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)), "{err}");
  assert_eq!(h.record_count(student).await, 0);
  assert_eq!(h.enrollment(student).await.status, EnrollmentStatus::Enrolled);

  h.complete(student, 0, 5).await.unwrap();
  assert_eq!(h.quiz(student, 1, 9).await.unwrap().points.total, 10 + 19);
}

#[tokio::test]
async fn unknown_lesson_or_enrollment_is_not_found() {
  let h = harness(2).await;
  let student = h.enrolled_student().await;
  let programme = h.course.programme.programme_id;

  let err = h
    .sync
    .record_completion_and_sync(student, programme, h.course.module_id, Uuid::new_v4(), 5)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }), "{err}");

  let stranger = Uuid::new_v4();
  let err = h.complete(stranger, 0, 5).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }), "{err}");
  assert!(h.profile(stranger).await.is_none());
}

#[tokio::test]
async fn lesson_from_another_programme_leaves_no_partial_state() {
  let h = harness(2).await;
  let other = add_course(&*h.store, "Advanced Rust", 2, &[]).await;
  let student = h.enrolled_student().await;

  let err = h
    .sync
    .record_completion_and_sync(
      student,
      h.course.programme.programme_id,
      h.course.module_id,
      other.lessons[0].lesson_id,
      5,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }), "{err}");
  assert_eq!(h.record_count(student).await, 0);
  assert_eq!(h.enrollment(student).await.status, EnrollmentStatus::Enrolled);
}

#[tokio::test]
async fn cancelled_enrollment_rejects_activity() {
  let h = harness(2).await;
  let student = h.enrolled_student().await;
  h.sync
    .set_enrollment_status(student, h.course.programme.programme_id, EnrollmentStatus::Cancelled)
    .await
    .unwrap();

  let err = h.complete(student, 0, 5).await.unwrap_err();
  assert!(matches!(err, Error::InvalidState(_)), "{err}");
  assert_eq!(h.record_count(student).await, 0);

  // Re-enrolling renews the enrollment.
  let renewed = h
    .sync
    .enroll(student, h.course.programme.programme_id)
    .await
    .unwrap();
  assert_eq!(renewed.status, EnrollmentStatus::Enrolled);
  h.complete(student, 0, 5).await.unwrap();
}

#[tokio::test]
async fn completing_every_lesson_completes_the_enrollment_once() {
  let h = harness(2).await;
  let student = h.enrolled_student().await;

  let first = h.complete(student, 0, 10).await.unwrap();
  assert_eq!(first.progress.percentage, 50);

  let last = h.complete(student, 1, 10).await.unwrap();
  assert_eq!(last.progress.percentage, 100);
  assert!(last.progress.newly_completed);
  assert_eq!(last.progress.status, EnrollmentStatus::Completed);
  assert!(last.points.new_badges.contains(&Badge::ProgrammeComplete));
  let completed_at = h.enrollment(student).await.completed_at;
  assert_eq!(completed_at, Some(start()));

  h.advance_days(3);
  let repeat = h.complete(student, 0, 10).await.unwrap();
  assert!(!repeat.progress.newly_completed);
  assert_eq!(repeat.progress.status, EnrollmentStatus::Completed);

  h.reconciler.run_daily_reconciliation().await.unwrap();
  let enrollment = h.enrollment(student).await;
  assert_eq!(enrollment.status, EnrollmentStatus::Completed);
  assert_eq!(enrollment.completed_at, completed_at);
  assert_eq!(h.profile(student).await.unwrap().statistics.courses_completed, 1);
}

#[tokio::test]
async fn reopened_enrollment_is_not_completed_again_by_reconciliation() {
  let h = harness(1).await;
  let student = h.enrolled_student().await;
  let programme = h.course.programme.programme_id;
  assert!(h.complete(student, 0, 10).await.unwrap().progress.newly_completed);

  h.advance_days(1);
  h.sync
    .set_enrollment_status(student, programme, EnrollmentStatus::Active)
    .await
    .unwrap();
  h.reconciler.run_daily_reconciliation().await.unwrap();

  let enrollment = h.enrollment(student).await;
  assert_eq!(enrollment.status, EnrollmentStatus::Active);
  assert_eq!(enrollment.completed_at, None);
  assert_eq!(enrollment.progress.percentage, 100);
  assert_eq!(h.profile(student).await.unwrap().statistics.courses_completed, 0);
}

#[tokio::test]
async fn external_completion_is_rejected() {
  let h = harness(2).await;
  let student = h.enrolled_student().await;
  let err = h
    .sync
    .set_enrollment_status(student, h.course.programme.programme_id, EnrollmentStatus::Completed)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidState(_)), "{err}");
}

#[tokio::test]
async fn progress_never_decreases_across_events() {
  let h = harness(5).await;
  let student = h.enrolled_student().await;
  let mut last = 0;
  for lesson in [0, 1, 1, 2, 0, 3, 4, 2] {
    let outcome = h.complete(student, lesson, 3).await.unwrap();
    assert!(outcome.progress.percentage >= last);
    last = outcome.progress.percentage;
  }
  assert_eq!(last, 100);
}

#[tokio::test]
async fn streak_follows_calendar_days() {
  let h = harness(6).await;
  let student = h.enrolled_student().await;

  // Late evening then early morning: consecutive days despite the hours.
  h.clock.set(Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 0).unwrap());
  assert_eq!(h.complete(student, 0, 5).await.unwrap().streak.current, 1);
  h.clock.set(Utc.with_ymd_and_hms(2024, 1, 2, 0, 1, 0).unwrap());
  assert_eq!(h.complete(student, 1, 5).await.unwrap().streak.current, 2);
  h.advance_days(1);
  assert_eq!(
    h.complete(student, 2, 5).await.unwrap().streak,
    Streak { current: 3, longest: 3 }
  );

  // Same day twice does not extend the run.
  assert_eq!(h.complete(student, 3, 5).await.unwrap().streak.current, 3);

  // A missed day resets the current run but not the longest.
  h.advance_days(2);
  assert_eq!(
    h.complete(student, 4, 5).await.unwrap().streak,
    Streak { current: 1, longest: 3 }
  );
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reconciliation_agrees_with_the_live_path_and_is_idempotent() {
  let h = quiz_harness(4, &[1]).await;
  let student = h.enrolled_student().await;

  h.complete(student, 0, 15).await.unwrap();
  h.advance_days(1);
  h.quiz(student, 1, 7).await.unwrap();
  h.complete(student, 0, 5).await.unwrap();

  let live_profile = h.profile(student).await.unwrap();
  let live_enrollment = h.enrollment(student).await;
  assert_eq!(live_profile.gamification.total_points, 27);

  let report = h.reconciler.run_monthly_full_recalculation().await.unwrap();
  assert_eq!(report.students_processed, 1);
  assert_eq!(report.students_skipped, 0);
  assert_eq!(h.profile(student).await.unwrap(), live_profile);
  assert_eq!(h.enrollment(student).await, live_enrollment);

  h.reconciler.run_monthly_full_recalculation().await.unwrap();
  h.reconciler.run_daily_reconciliation().await.unwrap();
  assert_eq!(h.profile(student).await.unwrap(), live_profile);
  assert_eq!(h.enrollment(student).await, live_enrollment);
}

#[tokio::test]
async fn daily_reconciliation_only_visits_active_students() {
  let h = harness(3).await;
  let dormant = h.enrolled_student().await;
  h.complete(dormant, 0, 5).await.unwrap();

  h.advance_days(40);
  let active = h.enrolled_student().await;
  h.complete(active, 0, 5).await.unwrap();

  let daily = h.reconciler.run_daily_reconciliation().await.unwrap();
  assert_eq!(daily.job, JobKind::DailyReconciliation);
  assert_eq!(daily.students_processed, 1);

  let monthly = h.reconciler.run_monthly_full_recalculation().await.unwrap();
  assert_eq!(monthly.students_processed, 2);
}

#[tokio::test]
async fn hourly_refresh_decays_a_lapsed_streak() {
  let h = harness(3).await;
  let student = h.enrolled_student().await;
  h.complete(student, 0, 5).await.unwrap();
  h.advance_days(1);
  h.complete(student, 1, 5).await.unwrap();

  h.advance_days(3);
  h.reconciler.run_hourly_streak_refresh().await.unwrap();
  let profile = h.profile(student).await.unwrap();
  assert_eq!(profile.gamification.streak, Streak { current: 0, longest: 2 });
}

#[tokio::test]
async fn cleanup_keeps_points_and_longest_streak() {
  let h = harness(5).await;
  let student = h.enrolled_student().await;
  for lesson in 0..3 {
    h.complete(student, lesson, 10).await.unwrap();
    h.advance_days(1);
  }
  h.advance_days(200);
  h.complete(student, 3, 10).await.unwrap();

  let report = h.reconciler.run_weekly_cleanup().await.unwrap();
  assert_eq!(report.records_pruned, 3);
  assert_eq!(report.students_processed, 1);
  assert_eq!(h.record_count(student).await, 1);

  let profile = h.profile(student).await.unwrap();
  assert_eq!(profile.gamification.total_points, 40);
  assert_eq!(profile.gamification.archived_points(), 30);
  assert_eq!(profile.gamification.streak, Streak { current: 1, longest: 3 });

  h.reconciler.run_hourly_streak_refresh().await.unwrap();
  h.reconciler.run_monthly_full_recalculation().await.unwrap();

  let profile = h.profile(student).await.unwrap();
  assert_eq!(profile.gamification.total_points, 40);
  assert_eq!(profile.gamification.streak.longest, 3);
  let enrollment = h.enrollment(student).await;
  assert_eq!(enrollment.progress.completed_lessons.len(), 4);
  assert_eq!(enrollment.progress.percentage, 80);
  assert_eq!(enrollment.progress.time_spent_minutes, 40);
}

#[tokio::test]
async fn lesson_redone_after_cleanup_is_not_credited_twice() {
  let h = harness(5).await;
  let student = h.enrolled_student().await;
  h.complete(student, 0, 10).await.unwrap();

  h.advance_days(200);
  let report = h.reconciler.run_weekly_cleanup().await.unwrap();
  assert_eq!(report.records_pruned, 1);

  let again = h.complete(student, 0, 10).await.unwrap();
  assert_eq!(again.points.awarded, 0);
  assert_eq!(again.points.total, 10);
  assert_eq!(again.progress.percentage, 20);

  h.reconciler.run_monthly_full_recalculation().await.unwrap();
  let profile = h.profile(student).await.unwrap();
  assert_eq!(profile.gamification.total_points, 10);
  assert_eq!(profile.gamification.archived_points(), 10);
}

#[tokio::test]
async fn daily_reconciliation_repairs_drifted_aggregates() {
  let h = harness(4).await;
  let student = h.enrolled_student().await;
  let programme = h.course.programme.programme_id;
  h.complete(student, 0, 10).await.unwrap();

  h.store
    .transact(move |ledger| {
      let mut profile = ledger.profile(student)?.expect("profile exists");
      profile.set_points(999);
      profile.gamification.streak = Streak::default();
      ledger.put_profile(&profile)?;
      let mut enrollment = ledger.enrollment(student, programme)?.expect("enrollment exists");
      enrollment.progress.percentage = 7;
      ledger.put_enrollment(&enrollment)
    })
    .await
    .unwrap();

  let report = h.reconciler.run_daily_reconciliation().await.unwrap();
  assert_eq!(report.students_processed, 1);

  let profile = h.profile(student).await.unwrap();
  assert_eq!(profile.gamification.total_points, 10);
  assert_eq!(profile.gamification.level, 1);
  assert_eq!(profile.gamification.streak, Streak { current: 1, longest: 1 });
  let enrollment = h.enrollment(student).await;
  assert_eq!(enrollment.progress.percentage, 25);
  assert_eq!(enrollment.status, EnrollmentStatus::Active);
}

/// Delegates to a `SqliteStore`, failing one chosen transaction.
struct FlakyStore {
  inner:   SqliteStore,
  calls:   AtomicUsize,
  fail_at: AtomicUsize,
}

impl ProgressStore for FlakyStore {
  async fn transact<T, F>(&self, work: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Ledger) -> Result<T> + Send + 'static,
  {
    if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_at.load(Ordering::SeqCst) {
      return Err(Error::TransientStorage("database is locked".into()));
    }
    self.inner.transact(work).await
  }

  async fn read<T, F>(&self, work: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&dyn Ledger) -> Result<T> + Send + 'static,
  {
    self.inner.read(work).await
  }

  async fn active_students(&self, since: DateTime<Utc>) -> Result<Vec<Uuid>> {
    self.inner.active_students(since).await
  }

  async fn all_students(&self) -> Result<Vec<Uuid>> { self.inner.all_students().await }

  async fn students_with_completions_before(
    &self,
    before: DateTime<Utc>,
  ) -> Result<Vec<Uuid>> {
    self.inner.students_with_completions_before(before).await
  }

  async fn put_programme(&self, programme: Programme) -> Result<()> {
    self.inner.put_programme(programme).await
  }

  async fn put_lesson(&self, lesson: Lesson) -> Result<()> {
    self.inner.put_lesson(lesson).await
  }
}

#[tokio::test]
async fn failing_student_is_skipped_and_the_job_continues() {
  let flaky = FlakyStore {
    inner:   SqliteStore::open_in_memory().await.expect("in-memory store"),
    calls:   AtomicUsize::new(0),
    fail_at: AtomicUsize::new(usize::MAX),
  };
  let h = harness_with(flaky, 2, &[]).await;
  for _ in 0..3 {
    let student = h.enrolled_student().await;
    h.complete(student, 0, 5).await.unwrap();
  }

  h.store.calls.store(0, Ordering::SeqCst);
  h.store.fail_at.store(1, Ordering::SeqCst);
  let report = h.reconciler.run_daily_reconciliation().await.unwrap();
  assert_eq!(report.students_processed, 2);
  assert_eq!(report.students_skipped, 1);
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_summarises_counted_enrollments() {
  let h = harness(4).await;
  let other = add_course(&*h.store, "Advanced Rust", 2, &[]).await;
  let dropped = add_course(&*h.store, "Rust Macros", 2, &[]).await;
  let student = h.enrolled_student().await;
  h.sync.enroll(student, other.programme.programme_id).await.unwrap();
  h.sync.enroll(student, dropped.programme.programme_id).await.unwrap();
  h.sync
    .set_enrollment_status(student, dropped.programme.programme_id, EnrollmentStatus::Cancelled)
    .await
    .unwrap();

  h.complete(student, 0, 60).await.unwrap();
  h.complete(student, 1, 30).await.unwrap();
  h.sync
    .record_completion_and_sync(
      student,
      other.programme.programme_id,
      other.module_id,
      other.lessons[0].lesson_id,
      0,
    )
    .await
    .unwrap();

  let dashboard = Dashboard::new(h.store.clone(), h.dyn_clock());
  let snapshot = dashboard.snapshot(student).await.unwrap();
  assert_eq!(snapshot.enrolled_count, 2);
  assert_eq!(snapshot.average_progress, 50);
  assert_eq!(snapshot.total_hours_learned, 1.5);
  assert_eq!(snapshot.current_streak, 1);
  assert_eq!(snapshot.total_points, 30);
  assert_eq!(snapshot.courses.len(), 2);
  assert!(snapshot.courses.iter().any(|c| c.title == "Advanced Rust"));

  // Stale stored streak is shown as lapsed.
  h.advance_days(2);
  let snapshot = dashboard.snapshot(student).await.unwrap();
  assert_eq!(snapshot.current_streak, 0);
  assert_eq!(snapshot.longest_streak, 1);
}

#[tokio::test]
async fn dashboard_of_unknown_student_is_empty() {
  let h = harness(1).await;
  let dashboard = Dashboard::new(h.store.clone(), h.dyn_clock());
  let snapshot = dashboard.snapshot(Uuid::new_v4()).await.unwrap();
  assert_eq!(snapshot.enrolled_count, 0);
  assert_eq!(snapshot.level, 1);
  assert!(snapshot.courses.is_empty());
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn trigger_records_status() {
  let h = harness(2).await;
  let student = h.enrolled_student().await;
  h.complete(student, 0, 5).await.unwrap();

  let scheduler = Scheduler::new(h.reconciler.clone(), h.dyn_clock(), Schedule::default());
  let report = scheduler.trigger(JobKind::DailyReconciliation).await.unwrap();
  assert_eq!(report.students_processed, 1);

  let status = scheduler.status();
  assert_eq!(status.len(), 4);
  let daily = status
    .iter()
    .find(|s| s.job == JobKind::DailyReconciliation)
    .unwrap();
  assert_eq!(daily.state, JobState::Idle);
  assert_eq!(daily.runs, 1);
  assert_eq!(daily.last_report.as_ref(), Some(&report));
  assert_eq!(daily.next_run_at, Some(Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap()));
  assert!(status.iter().filter(|s| s.job != JobKind::DailyReconciliation).all(|s| s.runs == 0));
}

#[tokio::test]
async fn overlapping_runs_of_one_job_are_refused() {
  let h = harness(2).await;
  let student = h.enrolled_student().await;
  h.complete(student, 0, 5).await.unwrap();

  let scheduler = Scheduler::new(h.reconciler.clone(), h.dyn_clock(), Schedule::default());
  let (first, second) = tokio::join!(
    scheduler.trigger(JobKind::MonthlyFullRecalculation),
    scheduler.trigger(JobKind::MonthlyFullRecalculation),
  );
  assert!(first.is_ok());
  assert!(matches!(second, Err(Error::JobAlreadyRunning(_))));

  // Different jobs do not block each other.
  let (monthly, hourly) = tokio::join!(
    scheduler.trigger(JobKind::MonthlyFullRecalculation),
    scheduler.trigger(JobKind::HourlyStreakRefresh),
  );
  assert!(monthly.is_ok());
  assert!(hourly.is_ok());
}

#[tokio::test]
async fn scheduler_loops_stop_on_shutdown() {
  let h = harness(1).await;
  let scheduler = Arc::new(Scheduler::new(
    h.reconciler.clone(),
    h.dyn_clock(),
    Schedule::default(),
  ));
  let (tx, rx) = watch::channel(false);
  let handles = scheduler.start(rx);
  assert_eq!(handles.len(), 4);

  tx.send(true).unwrap();
  for handle in handles {
    handle.await.unwrap();
  }
}
