//! Progress percentage and module completion.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::programme::Lesson;

/// `round(100 × completed / total)`, clamped to `[0, 100]`.
///
/// A programme with no lessons is 0% complete.
pub fn percentage(completed: usize, total_lessons: u32) -> u8 {
  if total_lessons == 0 {
    return 0;
  }
  let pct = (completed as f64 * 100.0 / f64::from(total_lessons)).round();
  pct.clamp(0.0, 100.0) as u8
}

/// Modules whose every catalog lesson is in `completed_lessons`.
pub fn completed_modules<'a>(
  lessons: impl IntoIterator<Item = &'a Lesson>,
  completed_lessons: &BTreeSet<Uuid>,
) -> BTreeSet<Uuid> {
  let mut by_module: BTreeMap<Uuid, bool> = BTreeMap::new();
  for lesson in lessons {
    let done = completed_lessons.contains(&lesson.lesson_id);
    by_module
      .entry(lesson.module_id)
      .and_modify(|all| *all &= done)
      .or_insert(done);
  }
  by_module
    .into_iter()
    .filter_map(|(module, all)| all.then_some(module))
    .collect()
}

/// Mean of the given percentages, rounded to the nearest integer.
pub fn average(percentages: impl IntoIterator<Item = u8>) -> u8 {
  let (sum, count) = percentages
    .into_iter()
    .fold((0u64, 0u64), |(s, c), p| (s + u64::from(p), c + 1));
  if count == 0 {
    return 0;
  }
  (sum as f64 / count as f64).round() as u8
}
