//! Student aggregate profile: the destination of every derived value.
//!
//! The profile is the single point of contention between the live sync path
//! and reconciliation. Both mutate it only through the methods below, inside
//! a store transaction.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  completion::CompletionRecord,
  enrollment::{Enrollment, EnrollmentStatus},
  points::{self, Badge, BadgeInputs},
  streak::Streak,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gamification {
  pub total_points:     u64,
  /// Always `points::level_for(total_points)`.
  pub level:            u32,
  pub badges:           BTreeSet<Badge>,
  pub streak:           Streak,
  /// Points credited for lessons whose completion records have since been
  /// pruned, keyed by lesson.
  pub archived_lessons: BTreeMap<Uuid, u64>,
}

impl Default for Gamification {
  fn default() -> Self {
    Self {
      total_points:     0,
      level:            points::level_for(0),
      badges:           BTreeSet::new(),
      streak:           Streak::default(),
      archived_lessons: BTreeMap::new(),
    }
  }
}

impl Gamification {
  /// Keep the credit of records about to be pruned, at most once per lesson.
  pub fn archive(&mut self, pruned: &[CompletionRecord]) {
    for record in pruned {
      let points = points::record_points(record);
      self
        .archived_lessons
        .entry(record.lesson_id)
        .and_modify(|p| *p = (*p).max(points))
        .or_insert(points);
    }
  }

  pub fn archived_points(&self) -> u64 { self.archived_lessons.values().sum() }

  /// What `lesson_id` has already been credited, given its retained record.
  pub fn credited_for(&self, lesson_id: Uuid, retained: Option<&CompletionRecord>) -> u64 {
    let archived = self.archived_lessons.get(&lesson_id).copied().unwrap_or(0);
    retained.map_or(0, points::record_points).max(archived)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
  pub total_learning_minutes: u64,
  pub last_active_date:       Option<NaiveDate>,
  pub courses_enrolled:       u32,
  pub courses_completed:      u32,
  pub lessons_completed:      u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
  pub student_id:   Uuid,
  pub gamification: Gamification,
  pub statistics:   Statistics,
}

impl StudentProfile {
  pub fn new(student_id: Uuid) -> Self {
    Self {
      student_id,
      gamification: Gamification::default(),
      statistics: Statistics::default(),
    }
  }

  /// Set total points and the level derived from them.
  pub fn set_points(&mut self, total: u64) {
    self.gamification.total_points = total;
    self.gamification.level = points::level_for(total);
  }

  /// Store a recomputed streak, never letting the longest streak shrink.
  pub fn apply_streak(&mut self, recomputed: Streak) {
    self.gamification.streak = recomputed.merge_stored(self.gamification.streak);
  }

  pub fn mark_active(&mut self, day: NaiveDate) {
    let last = &mut self.statistics.last_active_date;
    *last = Some(last.map_or(day, |prev| prev.max(day)));
  }

  /// Refresh the statistics that are sums over the student's enrollments.
  pub fn apply_enrollments(&mut self, enrollments: &[Enrollment]) {
    let stats = &mut self.statistics;
    stats.total_learning_minutes =
      enrollments.iter().map(|e| e.progress.time_spent_minutes).sum();
    stats.lessons_completed = enrollments
      .iter()
      .map(|e| e.progress.completed_lessons.len() as u64)
      .sum();
    stats.courses_enrolled =
      enrollments.iter().filter(|e| e.status.is_counted()).count() as u32;
    stats.courses_completed = enrollments
      .iter()
      .filter(|e| e.status == EnrollmentStatus::Completed)
      .count() as u32;
  }

  /// Add every badge the current aggregates qualify for. Badges are never
  /// taken away.
  pub fn award_badges(&mut self) -> BTreeSet<Badge> {
    let earned = points::badges_earned(BadgeInputs {
      lessons_completed: self.statistics.lessons_completed,
      longest_streak:    self.gamification.streak.longest,
      level:             self.gamification.level,
      courses_completed: self.statistics.courses_completed,
    });
    let new: BTreeSet<Badge> =
      earned.difference(&self.gamification.badges).copied().collect();
    self.gamification.badges.extend(new.iter().copied());
    new
  }

  /// Learning time in hours, to one decimal place.
  pub fn total_learning_hours(&self) -> f64 {
    (self.statistics.total_learning_minutes as f64 / 6.0).round() / 10.0
  }
}
