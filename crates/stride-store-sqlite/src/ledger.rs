//! [`SqliteLedger`]: the [`Ledger`] view over an open transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use stride_core::{
  completion::CompletionRecord,
  enrollment::Enrollment,
  profile::StudentProfile,
  programme::{Lesson, Programme},
  store::Ledger,
};
use uuid::Uuid;

use crate::{
  Error,
  encode::{
    COMPLETION_COLUMNS, ENROLLMENT_COLUMNS, PROFILE_COLUMNS, RawCompletion,
    RawEnrollment, RawLesson, RawProfile, RawProgramme, decode_date, encode_archive, encode_badges,
    encode_count, encode_date, encode_dt, encode_status, encode_uuid,
    encode_uuid_set,
  },
};

/// Borrowed for the lifetime of one transaction. Writes become visible to
/// other connections only when the owning transaction commits.
pub struct SqliteLedger<'a> {
  conn: &'a Connection,
}

impl<'a> SqliteLedger<'a> {
  pub fn new(conn: &'a Connection) -> Self { Self { conn } }
}

/// Lift a driver result into the core error taxonomy.
fn db<T>(result: rusqlite::Result<T>) -> stride_core::Result<T> {
  result.map_err(|e| Error::from(e).into())
}

fn decoded<T>(result: crate::Result<T>) -> stride_core::Result<T> {
  result.map_err(Into::into)
}

impl Ledger for SqliteLedger<'_> {
  // ── Catalog ───────────────────────────────────────────────────────────────

  fn programme(&self, programme_id: Uuid) -> stride_core::Result<Option<Programme>> {
    let raw = db(
      self
        .conn
        .query_row(
          "SELECT programme_id, title, total_lessons, total_modules
           FROM programmes WHERE programme_id = ?1",
          rusqlite::params![encode_uuid(programme_id)],
          RawProgramme::from_row,
        )
        .optional(),
    )?;
    decoded(raw.map(RawProgramme::into_programme).transpose())
  }

  fn lesson(&self, lesson_id: Uuid) -> stride_core::Result<Option<Lesson>> {
    let raw = db(
      self
        .conn
        .query_row(
          "SELECT lesson_id, programme_id, module_id, title, is_quiz
           FROM lessons WHERE lesson_id = ?1",
          rusqlite::params![encode_uuid(lesson_id)],
          RawLesson::from_row,
        )
        .optional(),
    )?;
    decoded(raw.map(RawLesson::into_lesson).transpose())
  }

  fn programme_lessons(&self, programme_id: Uuid) -> stride_core::Result<Vec<Lesson>> {
    let mut stmt = db(self.conn.prepare_cached(
      "SELECT lesson_id, programme_id, module_id, title, is_quiz
       FROM lessons WHERE programme_id = ?1
       ORDER BY module_id, lesson_id",
    ))?;
    let raws = db(
      stmt
        .query_map(rusqlite::params![encode_uuid(programme_id)], RawLesson::from_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()),
    )?;
    decoded(raws.into_iter().map(RawLesson::into_lesson).collect())
  }

  // ── Completion records ────────────────────────────────────────────────────

  fn completion(
    &self,
    student_id: Uuid,
    lesson_id: Uuid,
  ) -> stride_core::Result<Option<CompletionRecord>> {
    let raw = db(
      self
        .conn
        .query_row(
          &format!(
            "SELECT {COMPLETION_COLUMNS} FROM completions
             WHERE student_id = ?1 AND lesson_id = ?2"
          ),
          rusqlite::params![encode_uuid(student_id), encode_uuid(lesson_id)],
          RawCompletion::from_row,
        )
        .optional(),
    )?;
    decoded(raw.map(RawCompletion::into_record).transpose())
  }

  fn put_completion(&mut self, record: &CompletionRecord) -> stride_core::Result<()> {
    db(self.conn.execute(
      "INSERT INTO completions (
         student_id, lesson_id, module_id, programme_id,
         completed_at, time_spent_minutes, quiz_score, quiz_max_score
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT (student_id, lesson_id) DO UPDATE SET
         module_id          = excluded.module_id,
         programme_id       = excluded.programme_id,
         completed_at       = excluded.completed_at,
         time_spent_minutes = excluded.time_spent_minutes,
         quiz_score         = excluded.quiz_score,
         quiz_max_score     = excluded.quiz_max_score",
      rusqlite::params![
        encode_uuid(record.student_id),
        encode_uuid(record.lesson_id),
        encode_uuid(record.module_id),
        encode_uuid(record.programme_id),
        encode_dt(record.completed_at),
        encode_count(record.time_spent_minutes),
        record.quiz.map(|q| q.score),
        record.quiz.map(|q| q.max_score),
      ],
    ))?;
    Ok(())
  }

  fn completions(&self, student_id: Uuid) -> stride_core::Result<Vec<CompletionRecord>> {
    let mut stmt = db(self.conn.prepare_cached(&format!(
      "SELECT {COMPLETION_COLUMNS} FROM completions
       WHERE student_id = ?1
       ORDER BY completed_at, lesson_id"
    )))?;
    let raws = db(
      stmt
        .query_map(rusqlite::params![encode_uuid(student_id)], RawCompletion::from_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()),
    )?;
    decoded(raws.into_iter().map(RawCompletion::into_record).collect())
  }

  fn recent_activity_days(
    &self,
    student_id: Uuid,
    limit: usize,
  ) -> stride_core::Result<Vec<NaiveDate>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = db(self.conn.prepare_cached(
      "SELECT DISTINCT substr(completed_at, 1, 10) AS day
       FROM completions
       WHERE student_id = ?1
       ORDER BY day DESC
       LIMIT ?2",
    ))?;
    let days: Vec<String> = db(
      stmt
        .query_map(rusqlite::params![encode_uuid(student_id), limit], |row| row.get(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()),
    )?;
    decoded(days.iter().map(|d| decode_date(d)).collect())
  }

  fn prune_completions(
    &mut self,
    student_id: Uuid,
    before: DateTime<Utc>,
  ) -> stride_core::Result<Vec<CompletionRecord>> {
    let student = encode_uuid(student_id);
    let cutoff = encode_dt(before);
    let raws = {
      let mut stmt = db(self.conn.prepare_cached(&format!(
        "SELECT {COMPLETION_COLUMNS} FROM completions
         WHERE student_id = ?1 AND completed_at < ?2
         ORDER BY completed_at, lesson_id"
      )))?;
      db(
        stmt
          .query_map(rusqlite::params![student, cutoff], RawCompletion::from_row)
          .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()),
      )?
    };
    db(self.conn.execute(
      "DELETE FROM completions WHERE student_id = ?1 AND completed_at < ?2",
      rusqlite::params![student, cutoff],
    ))?;
    decoded(raws.into_iter().map(RawCompletion::into_record).collect())
  }

  // ── Enrollments ───────────────────────────────────────────────────────────

  fn enrollment(
    &self,
    student_id: Uuid,
    programme_id: Uuid,
  ) -> stride_core::Result<Option<Enrollment>> {
    let raw = db(
      self
        .conn
        .query_row(
          &format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
             WHERE student_id = ?1 AND programme_id = ?2"
          ),
          rusqlite::params![encode_uuid(student_id), encode_uuid(programme_id)],
          RawEnrollment::from_row,
        )
        .optional(),
    )?;
    decoded(raw.map(RawEnrollment::into_enrollment).transpose())
  }

  fn enrollments(&self, student_id: Uuid) -> stride_core::Result<Vec<Enrollment>> {
    let mut stmt = db(self.conn.prepare_cached(&format!(
      "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
       WHERE student_id = ?1
       ORDER BY programme_id"
    )))?;
    let raws = db(
      stmt
        .query_map(rusqlite::params![encode_uuid(student_id)], RawEnrollment::from_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()),
    )?;
    decoded(raws.into_iter().map(RawEnrollment::into_enrollment).collect())
  }

  fn put_enrollment(&mut self, enrollment: &Enrollment) -> stride_core::Result<()> {
    let lessons = decoded(encode_uuid_set(&enrollment.progress.completed_lessons))?;
    let modules = decoded(encode_uuid_set(&enrollment.progress.completed_modules))?;
    db(self.conn.execute(
      "INSERT INTO enrollments (
         student_id, programme_id, status, enrolled_at, completed_at,
         completed_lessons, completed_modules, time_spent_minutes,
         last_activity_at, percentage
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
       ON CONFLICT (student_id, programme_id) DO UPDATE SET
         status             = excluded.status,
         enrolled_at        = excluded.enrolled_at,
         completed_at       = excluded.completed_at,
         completed_lessons  = excluded.completed_lessons,
         completed_modules  = excluded.completed_modules,
         time_spent_minutes = excluded.time_spent_minutes,
         last_activity_at   = excluded.last_activity_at,
         percentage         = excluded.percentage",
      rusqlite::params![
        encode_uuid(enrollment.student_id),
        encode_uuid(enrollment.programme_id),
        encode_status(enrollment.status),
        encode_dt(enrollment.enrolled_at),
        enrollment.completed_at.map(encode_dt),
        lessons,
        modules,
        encode_count(enrollment.progress.time_spent_minutes),
        enrollment.progress.last_activity_at.map(encode_dt),
        enrollment.progress.percentage,
      ],
    ))?;
    Ok(())
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  fn profile(&self, student_id: Uuid) -> stride_core::Result<Option<StudentProfile>> {
    let raw = db(
      self
        .conn
        .query_row(
          &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE student_id = ?1"),
          rusqlite::params![encode_uuid(student_id)],
          RawProfile::from_row,
        )
        .optional(),
    )?;
    decoded(raw.map(RawProfile::into_profile).transpose())
  }

  fn put_profile(&mut self, profile: &StudentProfile) -> stride_core::Result<()> {
    let g = &profile.gamification;
    let s = &profile.statistics;
    let badges = decoded(encode_badges(&g.badges))?;
    let archived = decoded(encode_archive(&g.archived_lessons))?;
    db(self.conn.execute(
      "INSERT INTO profiles (
         student_id, total_points, level, badges, current_streak,
         longest_streak, archived_lessons, total_learning_minutes,
         last_active_date, courses_enrolled, courses_completed, lessons_completed
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
       ON CONFLICT (student_id) DO UPDATE SET
         total_points           = excluded.total_points,
         level                  = excluded.level,
         badges                 = excluded.badges,
         current_streak         = excluded.current_streak,
         longest_streak         = excluded.longest_streak,
         archived_lessons       = excluded.archived_lessons,
         total_learning_minutes = excluded.total_learning_minutes,
         last_active_date       = excluded.last_active_date,
         courses_enrolled       = excluded.courses_enrolled,
         courses_completed      = excluded.courses_completed,
         lessons_completed      = excluded.lessons_completed",
      rusqlite::params![
        encode_uuid(profile.student_id),
        encode_count(g.total_points),
        g.level,
        badges,
        g.streak.current,
        g.streak.longest,
        archived,
        encode_count(s.total_learning_minutes),
        s.last_active_date.map(encode_date),
        s.courses_enrolled,
        s.courses_completed,
        encode_count(s.lessons_completed),
      ],
    ))?;
    Ok(())
  }
}
