//! SQL schema for the Stride SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS programmes (
    programme_id  TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    total_lessons INTEGER NOT NULL,
    total_modules INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS lessons (
    lesson_id    TEXT PRIMARY KEY,
    programme_id TEXT NOT NULL REFERENCES programmes(programme_id),
    module_id    TEXT NOT NULL,
    title        TEXT NOT NULL,
    is_quiz      INTEGER NOT NULL DEFAULT 0
);

-- At most one record per (student, lesson); re-completion updates in place.
CREATE TABLE IF NOT EXISTS completions (
    student_id         TEXT NOT NULL,
    lesson_id          TEXT NOT NULL REFERENCES lessons(lesson_id),
    module_id          TEXT NOT NULL,
    programme_id       TEXT NOT NULL REFERENCES programmes(programme_id),
    completed_at       TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    time_spent_minutes INTEGER NOT NULL,
    quiz_score         INTEGER,
    quiz_max_score     INTEGER,
    PRIMARY KEY (student_id, lesson_id)
);

CREATE TABLE IF NOT EXISTS enrollments (
    student_id         TEXT NOT NULL,
    programme_id       TEXT NOT NULL REFERENCES programmes(programme_id),
    status             TEXT NOT NULL,
    enrolled_at        TEXT NOT NULL,
    completed_at       TEXT,
    completed_lessons  TEXT NOT NULL DEFAULT '[]',  -- JSON array of UUIDs
    completed_modules  TEXT NOT NULL DEFAULT '[]',  -- JSON array of UUIDs
    time_spent_minutes INTEGER NOT NULL DEFAULT 0,
    last_activity_at   TEXT,
    percentage         INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (student_id, programme_id)
);

CREATE TABLE IF NOT EXISTS profiles (
    student_id             TEXT PRIMARY KEY,
    total_points           INTEGER NOT NULL DEFAULT 0,
    level                  INTEGER NOT NULL DEFAULT 1,
    badges                 TEXT NOT NULL DEFAULT '[]',
    current_streak         INTEGER NOT NULL DEFAULT 0,
    longest_streak         INTEGER NOT NULL DEFAULT 0,
    archived_lessons       TEXT NOT NULL DEFAULT '{}',  -- JSON object, lesson UUID → points
    total_learning_minutes INTEGER NOT NULL DEFAULT 0,
    last_active_date       TEXT,
    courses_enrolled       INTEGER NOT NULL DEFAULT 0,
    courses_completed      INTEGER NOT NULL DEFAULT 0,
    lessons_completed      INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS lessons_programme_idx       ON lessons(programme_id, module_id);
CREATE INDEX IF NOT EXISTS completions_student_day_idx ON completions(student_id, completed_at);
CREATE INDEX IF NOT EXISTS completions_completed_idx   ON completions(completed_at);

PRAGMA user_version = 1;
";
