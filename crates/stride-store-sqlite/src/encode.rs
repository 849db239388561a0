//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so lexical order equals chronological order and the first ten
//! characters are the UTC calendar day. Sets are stored as compact JSON arrays.
//! UUIDs are stored as hyphenated lowercase strings.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use stride_core::{
  completion::{CompletionRecord, QuizScore},
  enrollment::{Enrollment, EnrollmentStatus, ProgressBlock},
  points::Badge,
  profile::{Gamification, Statistics, StudentProfile},
  programme::{Lesson, Programme},
  streak::Streak,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_uuid_set(ids: &BTreeSet<Uuid>) -> Result<String> {
  Ok(serde_json::to_string(ids)?)
}

pub fn decode_uuid_set(s: &str) -> Result<BTreeSet<Uuid>> {
  Ok(serde_json::from_str(s)?)
}

// ─── DateTime<Utc> / NaiveDate ────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Counters ────────────────────────────────────────────────────────────────

pub fn encode_count(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

pub fn decode_count<T: TryFrom<i64>>(kind: &'static str, n: i64) -> Result<T> {
  T::try_from(n).map_err(|_| Error::UnknownVariant { kind, value: n.to_string() })
}

// ─── EnrollmentStatus ────────────────────────────────────────────────────────

pub fn encode_status(s: EnrollmentStatus) -> &'static str { s.into() }

pub fn decode_status(s: &str) -> Result<EnrollmentStatus> {
  s.parse().map_err(|_| Error::UnknownVariant {
    kind:  "enrollment status",
    value: s.to_owned(),
  })
}

// ─── Badges ──────────────────────────────────────────────────────────────────

pub fn encode_badges(badges: &BTreeSet<Badge>) -> Result<String> {
  Ok(serde_json::to_string(badges)?)
}

pub fn decode_badges(s: &str) -> Result<BTreeSet<Badge>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Archived lesson credit ──────────────────────────────────────────────────

pub fn encode_archive(archived: &BTreeMap<Uuid, u64>) -> Result<String> {
  Ok(serde_json::to_string(archived)?)
}

pub fn decode_archive(s: &str) -> Result<BTreeMap<Uuid, u64>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `programmes` row.
pub struct RawProgramme {
  pub programme_id:  String,
  pub title:         String,
  pub total_lessons: i64,
  pub total_modules: i64,
}

impl RawProgramme {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      programme_id:  row.get(0)?,
      title:         row.get(1)?,
      total_lessons: row.get(2)?,
      total_modules: row.get(3)?,
    })
  }

  pub fn into_programme(self) -> Result<Programme> {
    Ok(Programme {
      programme_id:  decode_uuid(&self.programme_id)?,
      title:         self.title,
      total_lessons: decode_count("lesson count", self.total_lessons)?,
      total_modules: decode_count("module count", self.total_modules)?,
    })
  }
}

/// Raw values read directly from a `lessons` row.
pub struct RawLesson {
  pub lesson_id:    String,
  pub programme_id: String,
  pub module_id:    String,
  pub title:        String,
  pub is_quiz:      bool,
}

impl RawLesson {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      lesson_id:    row.get(0)?,
      programme_id: row.get(1)?,
      module_id:    row.get(2)?,
      title:        row.get(3)?,
      is_quiz:      row.get(4)?,
    })
  }

  pub fn into_lesson(self) -> Result<Lesson> {
    Ok(Lesson {
      lesson_id:    decode_uuid(&self.lesson_id)?,
      programme_id: decode_uuid(&self.programme_id)?,
      module_id:    decode_uuid(&self.module_id)?,
      title:        self.title,
      is_quiz:      self.is_quiz,
    })
  }
}

/// Raw values read directly from a `completions` row.
pub struct RawCompletion {
  pub student_id:         String,
  pub lesson_id:          String,
  pub module_id:          String,
  pub programme_id:       String,
  pub completed_at:       String,
  pub time_spent_minutes: i64,
  pub quiz_score:         Option<i64>,
  pub quiz_max_score:     Option<i64>,
}

pub const COMPLETION_COLUMNS: &str = "student_id, lesson_id, module_id, programme_id, \
   completed_at, time_spent_minutes, quiz_score, quiz_max_score";

impl RawCompletion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:         row.get(0)?,
      lesson_id:          row.get(1)?,
      module_id:          row.get(2)?,
      programme_id:       row.get(3)?,
      completed_at:       row.get(4)?,
      time_spent_minutes: row.get(5)?,
      quiz_score:         row.get(6)?,
      quiz_max_score:     row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<CompletionRecord> {
    let quiz = match (self.quiz_score, self.quiz_max_score) {
      (Some(score), Some(max_score)) => Some(QuizScore {
        score:     decode_count("quiz score", score)?,
        max_score: decode_count("quiz max score", max_score)?,
      }),
      _ => None,
    };
    Ok(CompletionRecord {
      student_id: decode_uuid(&self.student_id)?,
      lesson_id: decode_uuid(&self.lesson_id)?,
      module_id: decode_uuid(&self.module_id)?,
      programme_id: decode_uuid(&self.programme_id)?,
      completed_at: decode_dt(&self.completed_at)?,
      time_spent_minutes: decode_count("time spent", self.time_spent_minutes)?,
      quiz,
    })
  }
}

/// Raw values read directly from an `enrollments` row.
pub struct RawEnrollment {
  pub student_id:         String,
  pub programme_id:       String,
  pub status:             String,
  pub enrolled_at:        String,
  pub completed_at:       Option<String>,
  pub completed_lessons:  String,
  pub completed_modules:  String,
  pub time_spent_minutes: i64,
  pub last_activity_at:   Option<String>,
  pub percentage:         i64,
}

pub const ENROLLMENT_COLUMNS: &str = "student_id, programme_id, status, enrolled_at, \
   completed_at, completed_lessons, completed_modules, time_spent_minutes, \
   last_activity_at, percentage";

impl RawEnrollment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:         row.get(0)?,
      programme_id:       row.get(1)?,
      status:             row.get(2)?,
      enrolled_at:        row.get(3)?,
      completed_at:       row.get(4)?,
      completed_lessons:  row.get(5)?,
      completed_modules:  row.get(6)?,
      time_spent_minutes: row.get(7)?,
      last_activity_at:   row.get(8)?,
      percentage:         row.get(9)?,
    })
  }

  pub fn into_enrollment(self) -> Result<Enrollment> {
    Ok(Enrollment {
      student_id:   decode_uuid(&self.student_id)?,
      programme_id: decode_uuid(&self.programme_id)?,
      status:       decode_status(&self.status)?,
      enrolled_at:  decode_dt(&self.enrolled_at)?,
      completed_at: self.completed_at.as_deref().map(decode_dt).transpose()?,
      progress:     ProgressBlock {
        completed_lessons:  decode_uuid_set(&self.completed_lessons)?,
        completed_modules:  decode_uuid_set(&self.completed_modules)?,
        time_spent_minutes: decode_count("time spent", self.time_spent_minutes)?,
        last_activity_at:   self
          .last_activity_at
          .as_deref()
          .map(decode_dt)
          .transpose()?,
        percentage:         decode_count("percentage", self.percentage)?,
      },
    })
  }
}

/// Raw values read directly from a `profiles` row.
pub struct RawProfile {
  pub student_id:             String,
  pub total_points:           i64,
  pub level:                  i64,
  pub badges:                 String,
  pub current_streak:         i64,
  pub longest_streak:         i64,
  pub archived_lessons:       String,
  pub total_learning_minutes: i64,
  pub last_active_date:       Option<String>,
  pub courses_enrolled:       i64,
  pub courses_completed:      i64,
  pub lessons_completed:      i64,
}

pub const PROFILE_COLUMNS: &str = "student_id, total_points, level, badges, \
   current_streak, longest_streak, archived_lessons, total_learning_minutes, \
   last_active_date, courses_enrolled, courses_completed, lessons_completed";

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:             row.get(0)?,
      total_points:           row.get(1)?,
      level:                  row.get(2)?,
      badges:                 row.get(3)?,
      current_streak:         row.get(4)?,
      longest_streak:         row.get(5)?,
      archived_lessons:       row.get(6)?,
      total_learning_minutes: row.get(7)?,
      last_active_date:       row.get(8)?,
      courses_enrolled:       row.get(9)?,
      courses_completed:      row.get(10)?,
      lessons_completed:      row.get(11)?,
    })
  }

  pub fn into_profile(self) -> Result<StudentProfile> {
    Ok(StudentProfile {
      student_id:   decode_uuid(&self.student_id)?,
      gamification: Gamification {
        total_points:     decode_count("points", self.total_points)?,
        level:            decode_count("level", self.level)?,
        badges:           decode_badges(&self.badges)?,
        streak:           Streak {
          current: decode_count("streak", self.current_streak)?,
          longest: decode_count("streak", self.longest_streak)?,
        },
        archived_lessons: decode_archive(&self.archived_lessons)?,
      },
      statistics:   Statistics {
        total_learning_minutes: decode_count("minutes", self.total_learning_minutes)?,
        last_active_date:       self
          .last_active_date
          .as_deref()
          .map(decode_date)
          .transpose()?,
        courses_enrolled:       decode_count("course count", self.courses_enrolled)?,
        courses_completed:      decode_count("course count", self.courses_completed)?,
        lessons_completed:      decode_count("lesson count", self.lessons_completed)?,
      },
    })
  }
}
