//! Points, levels and badges.
//!
//! Each lesson is worth the best of its retained record and the credit
//! archived when an older record for it was pruned. The live path adds the
//! difference between the new value and the old one for the touched lesson;
//! reconciliation sums [`credited_points`]. Both go through
//! [`record_points`], so they always agree.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::completion::{CompletionRecord, QuizScore};

pub const LESSON_POINTS: u64 = 10;
pub const POINTS_PER_LEVEL: u64 = 100;

/// Roughly one point per 10% scored, rounded half away from zero.
pub fn quiz_points(quiz: &QuizScore) -> u64 {
  (quiz.percentage() / 10.0).round() as u64
}

/// Points contributed by a single completion record.
pub fn record_points(record: &CompletionRecord) -> u64 {
  LESSON_POINTS + record.quiz.as_ref().map_or(0, quiz_points)
}

/// Points owed for a student's lessons given the credit archived for pruned
/// records. A lesson present in both counts once, at its higher value.
pub fn credited_points<'a>(
  archived: &BTreeMap<Uuid, u64>,
  records: impl IntoIterator<Item = &'a CompletionRecord>,
) -> u64 {
  let mut per_lesson = archived.clone();
  for record in records {
    let points = record_points(record);
    per_lesson
      .entry(record.lesson_id)
      .and_modify(|p| *p = (*p).max(points))
      .or_insert(points);
  }
  per_lesson.values().sum()
}

/// `floor(points / 100) + 1`.
pub fn level_for(points: u64) -> u32 {
  u32::try_from(points / POINTS_PER_LEVEL + 1).unwrap_or(u32::MAX)
}

// ─── Badges ──────────────────────────────────────────────────────────────────

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
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Badge {
  FirstLesson,
  TenLessons,
  HundredLessons,
  #[serde(rename = "streak-7")]
  #[strum(serialize = "streak-7")]
  Streak7,
  #[serde(rename = "streak-30")]
  #[strum(serialize = "streak-30")]
  Streak30,
  #[serde(rename = "level-5")]
  #[strum(serialize = "level-5")]
  Level5,
  #[serde(rename = "level-10")]
  #[strum(serialize = "level-10")]
  Level10,
  ProgrammeComplete,
}

/// The aggregate values badges are awarded from.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadgeInputs {
  pub lessons_completed: u64,
  pub longest_streak:    u32,
  pub level:             u32,
  pub courses_completed: u32,
}

/// Every badge the inputs qualify for.
pub fn badges_earned(inputs: BadgeInputs) -> BTreeSet<Badge> {
  let rules = [
    (Badge::FirstLesson, inputs.lessons_completed >= 1),
    (Badge::TenLessons, inputs.lessons_completed >= 10),
    (Badge::HundredLessons, inputs.lessons_completed >= 100),
    (Badge::Streak7, inputs.longest_streak >= 7),
    (Badge::Streak30, inputs.longest_streak >= 30),
    (Badge::Level5, inputs.level >= 5),
    (Badge::Level10, inputs.level >= 10),
    (Badge::ProgrammeComplete, inputs.courses_completed >= 1),
  ];
  rules
    .into_iter()
    .filter_map(|(badge, earned)| earned.then_some(badge))
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn record(quiz: Option<QuizScore>) -> CompletionRecord {
    CompletionRecord {
      student_id: Uuid::new_v4(),
      lesson_id: Uuid::new_v4(),
      module_id: Uuid::new_v4(),
      programme_id: Uuid::new_v4(),
      completed_at: Utc::now(),
      time_spent_minutes: 0,
      quiz,
    }
  }

  #[test]
  fn level_formula() {
    assert_eq!(level_for(0), 1);
    assert_eq!(level_for(99), 1);
    assert_eq!(level_for(100), 2);
    assert_eq!(level_for(250), 3);
  }

  #[test]
  fn quiz_points_round_to_nearest() {
    assert_eq!(quiz_points(&QuizScore { score: 10, max_score: 10 }), 10);
    assert_eq!(quiz_points(&QuizScore { score: 0, max_score: 10 }), 0);
    // 85% → 8.5 → 9
    assert_eq!(quiz_points(&QuizScore { score: 17, max_score: 20 }), 9);
    // 84% → 8.4 → 8
    assert_eq!(quiz_points(&QuizScore { score: 21, max_score: 25 }), 8);
  }

  #[test]
  fn record_points_include_quiz_bonus() {
    assert_eq!(record_points(&record(None)), 10);
    let quiz = QuizScore { score: 7, max_score: 10 };
    assert_eq!(record_points(&record(Some(quiz))), 17);
  }

  #[test]
  fn live_increments_sum_to_full_recomputation() {
    let records = vec![
      record(None),
      record(Some(QuizScore { score: 3, max_score: 4 })),
      record(None),
    ];
    let incremental: u64 = records.iter().map(record_points).sum();
    assert_eq!(incremental, credited_points(&BTreeMap::new(), &records));
    assert_eq!(incremental, 10 + 18 + 10);
  }

  #[test]
  fn archived_credit_counts_once_per_lesson() {
    let retained = record(Some(QuizScore { score: 5, max_score: 10 }));
    let gone = Uuid::new_v4();
    let archived = BTreeMap::from([(retained.lesson_id, 10), (gone, 20)]);
    // 15 for the retained lesson beats its archived 10; the pruned lesson adds 20.
    assert_eq!(credited_points(&archived, [&retained]), 15 + 20);

    let archived = BTreeMap::from([(retained.lesson_id, 19)]);
    assert_eq!(credited_points(&archived, [&retained]), 19);
    assert_eq!(credited_points(&BTreeMap::new(), [&retained]), 15);
  }

  #[test]
  fn badges_follow_thresholds() {
    let none = badges_earned(BadgeInputs::default());
    assert!(none.is_empty());

    let some = badges_earned(BadgeInputs {
      lessons_completed: 12,
      longest_streak:    7,
      level:             2,
      courses_completed: 1,
    });
    assert_eq!(
      some,
      BTreeSet::from([
        Badge::FirstLesson,
        Badge::TenLessons,
        Badge::Streak7,
        Badge::ProgrammeComplete,
      ])
    );
  }
}
