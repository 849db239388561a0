//! Learning-streak calculation.
//!
//! All day arithmetic happens on UTC calendar dates ([`NaiveDate`]), never on
//! raw timestamps, so a completion at 23:59 and one at 00:01 the next day are
//! exactly one day apart regardless of the hours between them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Current and longest learning streak, in days.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct Streak {
  pub current: u32,
  pub longest: u32,
}

impl Streak {
  /// Combine a recomputed streak with the stored one.
  ///
  /// The longest streak never shrinks: pruned history can make the
  /// recomputed value smaller than what the student actually achieved.
  pub fn merge_stored(self, stored: Streak) -> Streak {
    let longest = self.longest.max(stored.longest);
    Streak { current: self.current.min(longest), longest }
  }

  /// The streak as it should be displayed on `today`: a run whose last day
  /// is before yesterday is no longer live.
  pub fn as_of(self, last_active: Option<NaiveDate>, today: NaiveDate) -> Streak {
    match last_active {
      Some(day) if days_between(day, today) <= 1 => self,
      _ => Streak { current: 0, ..self },
    }
  }
}

/// Normalise timestamps to UTC calendar days.
pub fn activity_days<I>(stamps: I) -> Vec<NaiveDate>
where
  I: IntoIterator<Item = DateTime<Utc>>,
{
  stamps.into_iter().map(|t| t.date_naive()).collect()
}

/// Compute the streak from the days a student was active.
///
/// `days` may be in any order and contain duplicates. The current streak is
/// the run containing the most recent day if that day is today or yesterday;
/// otherwise it is 0.
pub fn compute<I>(days: I, today: NaiveDate) -> Streak
where
  I: IntoIterator<Item = NaiveDate>,
{
  let mut days: Vec<NaiveDate> = days.into_iter().collect();
  days.sort_unstable_by(|a, b| b.cmp(a));
  days.dedup();

  let Some(&latest) = days.first() else {
    return Streak::default();
  };

  let mut run = 1u32;
  let mut longest = 1u32;
  let mut first_run = None;
  for pair in days.windows(2) {
    if days_between(pair[1], pair[0]) == 1 {
      run += 1;
    } else {
      first_run.get_or_insert(run);
      run = 1;
    }
    longest = longest.max(run);
  }
  let first_run = first_run.unwrap_or(run);

  // A day in the future (clock skew) counts as today.
  let current = if days_between(latest, today) <= 1 { first_run } else { 0 };
  Streak { current, longest }
}

fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
  later.signed_duration_since(earlier).num_days()
}
