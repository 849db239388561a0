//! The `ProgressStore` trait and the transactional [`Ledger`] view.
//!
//! The trait is implemented by storage backends (e.g. `stride-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.
//!
//! Every read-modify-write of aggregates happens inside
//! [`ProgressStore::transact`]: the backend opens a transaction, hands the
//! closure a [`Ledger`] bound to it, and commits only if the closure returns
//! `Ok`. Returning `Err` (or panicking) rolls every write back.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  Result,
  completion::CompletionRecord,
  enrollment::Enrollment,
  profile::StudentProfile,
  programme::{Lesson, Programme},
};

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Record-store primitives available inside one unit of work.
///
/// Methods are synchronous: the backend runs the whole unit of work on its
/// own thread while holding the transaction.
pub trait Ledger {
  // ── Catalog ───────────────────────────────────────────────────────────

  fn programme(&self, programme_id: Uuid) -> Result<Option<Programme>>;

  fn lesson(&self, lesson_id: Uuid) -> Result<Option<Lesson>>;

  /// All catalog lessons of a programme, ordered by module then lesson.
  fn programme_lessons(&self, programme_id: Uuid) -> Result<Vec<Lesson>>;

  // ── Completion records ────────────────────────────────────────────────

  fn completion(
    &self,
    student_id: Uuid,
    lesson_id: Uuid,
  ) -> Result<Option<CompletionRecord>>;

  /// Insert or replace the record for `(student_id, lesson_id)`.
  fn put_completion(&mut self, record: &CompletionRecord) -> Result<()>;

  /// Every retained record of a student, oldest first.
  fn completions(&self, student_id: Uuid) -> Result<Vec<CompletionRecord>>;

  /// The most recent `limit` distinct UTC days with at least one completion,
  /// newest first.
  fn recent_activity_days(
    &self,
    student_id: Uuid,
    limit: usize,
  ) -> Result<Vec<NaiveDate>>;

  /// Delete a student's records completed strictly before `before` and
  /// return them.
  fn prune_completions(
    &mut self,
    student_id: Uuid,
    before: DateTime<Utc>,
  ) -> Result<Vec<CompletionRecord>>;

  // ── Enrollments ───────────────────────────────────────────────────────

  fn enrollment(
    &self,
    student_id: Uuid,
    programme_id: Uuid,
  ) -> Result<Option<Enrollment>>;

  /// All enrollments of a student, ordered by programme id.
  fn enrollments(&self, student_id: Uuid) -> Result<Vec<Enrollment>>;

  fn put_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

  // ── Profiles ──────────────────────────────────────────────────────────

  fn profile(&self, student_id: Uuid) -> Result<Option<StudentProfile>>;

  fn put_profile(&mut self, profile: &StudentProfile) -> Result<()>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Stride record store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ProgressStore: Send + Sync {
  /// Run `work` as one atomic unit of work.
  ///
  /// Conflicts with concurrent writers surface as
  /// [`Error::TransientStorage`](crate::Error::TransientStorage).
  fn transact<T, F>(
    &self,
    work: F,
  ) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Ledger) -> Result<T> + Send + 'static;

  /// Run a read-only closure against a consistent snapshot.
  fn read<T, F>(&self, work: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&dyn Ledger) -> Result<T> + Send + 'static;

  // ── Batch scopes ──────────────────────────────────────────────────────

  /// Students with at least one completion at or after `since`.
  fn active_students(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Uuid>>> + Send + '_;

  /// Every student with a profile or an enrollment.
  fn all_students(&self) -> impl Future<Output = Result<Vec<Uuid>>> + Send + '_;

  /// Students holding at least one completion older than `before`.
  fn students_with_completions_before(
    &self,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Uuid>>> + Send + '_;

  // ── Catalog maintenance ───────────────────────────────────────────────

  fn put_programme(
    &self,
    programme: Programme,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn put_lesson(&self, lesson: Lesson) -> impl Future<Output = Result<()>> + Send + '_;
}
