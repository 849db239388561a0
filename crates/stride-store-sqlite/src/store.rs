//! [`SqliteStore`]: the SQLite implementation of [`ProgressStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use stride_core::{
  programme::{Lesson, Programme},
  store::{Ledger, ProgressStore},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{decode_uuid, encode_dt, encode_uuid},
  ledger::SqliteLedger,
  schema::SCHEMA,
};

/// How long a writer waits on a locked database before reporting a
/// transient failure.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Stride record store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-column `SELECT` of student ids.
  async fn student_ids(
    &self,
    sql: &'static str,
    param: Option<String>,
  ) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = match param {
          Some(p) => stmt
            .query_map(rusqlite::params![p], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?,
          None => stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}

// ─── ProgressStore impl ──────────────────────────────────────────────────────

impl ProgressStore for SqliteStore {
  async fn transact<T, F>(&self, work: F) -> stride_core::Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Ledger) -> stride_core::Result<T> + Send + 'static,
  {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = work(&mut SqliteLedger::new(&tx));
        // Dropping an uncommitted transaction rolls it back.
        if result.is_ok() {
          tx.commit()?;
        }
        Ok(result)
      })
      .await
      .map_err(Error::from)?;
    outcome
  }

  async fn read<T, F>(&self, work: F) -> stride_core::Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&dyn Ledger) -> stride_core::Result<T> + Send + 'static,
  {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let result = work(&SqliteLedger::new(&tx));
        tx.finish()?;
        Ok(result)
      })
      .await
      .map_err(Error::from)?;
    outcome
  }

  async fn active_students(&self, since: DateTime<Utc>) -> stride_core::Result<Vec<Uuid>> {
    Ok(
      self
        .student_ids(
          "SELECT DISTINCT student_id FROM completions
           WHERE completed_at >= ?1
           ORDER BY student_id",
          Some(encode_dt(since)),
        )
        .await?,
    )
  }

  async fn all_students(&self) -> stride_core::Result<Vec<Uuid>> {
    Ok(
      self
        .student_ids(
          "SELECT student_id FROM profiles
           UNION
           SELECT student_id FROM enrollments
           ORDER BY 1",
          None,
        )
        .await?,
    )
  }

  async fn students_with_completions_before(
    &self,
    before: DateTime<Utc>,
  ) -> stride_core::Result<Vec<Uuid>> {
    Ok(
      self
        .student_ids(
          "SELECT DISTINCT student_id FROM completions
           WHERE completed_at < ?1
           ORDER BY student_id",
          Some(encode_dt(before)),
        )
        .await?,
    )
  }

  async fn put_programme(&self, programme: Programme) -> stride_core::Result<()> {
    let id_str = encode_uuid(programme.programme_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO programmes (programme_id, title, total_lessons, total_modules)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (programme_id) DO UPDATE SET
             title         = excluded.title,
             total_lessons = excluded.total_lessons,
             total_modules = excluded.total_modules",
          rusqlite::params![
            id_str,
            programme.title,
            programme.total_lessons,
            programme.total_modules,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from)?;
    Ok(())
  }

  async fn put_lesson(&self, lesson: Lesson) -> stride_core::Result<()> {
    let lesson_id_str = encode_uuid(lesson.lesson_id);
    let programme_id_str = encode_uuid(lesson.programme_id);
    let module_id_str = encode_uuid(lesson.module_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lessons (lesson_id, programme_id, module_id, title, is_quiz)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (lesson_id) DO UPDATE SET
             programme_id = excluded.programme_id,
             module_id    = excluded.module_id,
             title        = excluded.title,
             is_quiz      = excluded.is_quiz",
          rusqlite::params![
            lesson_id_str,
            programme_id_str,
            module_id_str,
            lesson.title,
            lesson.is_quiz,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::from)?;
    Ok(())
  }
}
