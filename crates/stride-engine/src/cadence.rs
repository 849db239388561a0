//! Calendar cadences for reconciliation jobs, all in UTC.
//!
//! Textual form, as used in configuration:
//!
//! | form                  | example              |
//! |-----------------------|----------------------|
//! | `hourly@MM`           | `hourly@05`          |
//! | `daily@HH:MM`         | `daily@02:00`        |
//! | `weekly@DOW HH:MM`    | `weekly@sun 03:00`   |
//! | `monthly@D HH:MM`     | `monthly@1 04:00`    |
//!
//! Monthly days are limited to 1..=28 so that every month has the day.

use std::{fmt, str::FromStr};

use chrono::{
  DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday,
};
use serde::{Deserialize, Serialize};
use stride_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Cadence {
  Hourly { minute: u32 },
  Daily { hour: u32, minute: u32 },
  Weekly { weekday: Weekday, hour: u32, minute: u32 },
  Monthly { day: u32, hour: u32, minute: u32 },
}

impl Cadence {
  /// The first firing time strictly after `after`.
  pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = after.date_naive();
    match *self {
      Cadence::Hourly { minute } => {
        let hour_start = after
          .with_minute(0)?
          .with_second(0)?
          .with_nanosecond(0)?;
        let candidate = hour_start + Duration::minutes(i64::from(minute));
        Some(if candidate > after { candidate } else { candidate + Duration::hours(1) })
      }
      Cadence::Daily { hour, minute } => {
        let candidate = at(date, hour, minute)?;
        if candidate > after {
          Some(candidate)
        } else {
          at(date.succ_opt()?, hour, minute)
        }
      }
      Cadence::Weekly { weekday, hour, minute } => {
        let ahead = (7 + weekday.num_days_from_monday()
          - date.weekday().num_days_from_monday())
          % 7;
        let candidate = at(date + Duration::days(i64::from(ahead)), hour, minute)?;
        Some(if candidate > after { candidate } else { candidate + Duration::weeks(1) })
      }
      Cadence::Monthly { day, hour, minute } => {
        let this_month = NaiveDate::from_ymd_opt(date.year(), date.month(), day)?;
        let candidate = at(this_month, hour, minute)?;
        if candidate > after {
          return Some(candidate);
        }
        let (year, month) = if date.month() == 12 {
          (date.year() + 1, 1)
        } else {
          (date.year(), date.month() + 1)
        };
        at(NaiveDate::from_ymd_opt(year, month, day)?, hour, minute)
      }
    }
  }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
  Some(date.and_time(NaiveTime::from_hms_opt(hour, minute, 0)?).and_utc())
}

// ─── Text form ───────────────────────────────────────────────────────────────

fn invalid(input: &str, reason: &str) -> Error {
  Error::InvalidInput(format!("invalid cadence {input:?}: {reason}"))
}

fn parse_number(input: &str, part: &str, max: u32) -> Result<u32, Error> {
  part
    .parse::<u32>()
    .ok()
    .filter(|n| *n <= max)
    .ok_or_else(|| invalid(input, &format!("{part:?} is not a number in 0..={max}")))
}

fn parse_time(input: &str, part: &str) -> Result<(u32, u32), Error> {
  let (hour, minute) = part
    .split_once(':')
    .ok_or_else(|| invalid(input, "expected HH:MM"))?;
  Ok((parse_number(input, hour, 23)?, parse_number(input, minute, 59)?))
}

impl FromStr for Cadence {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (kind, rest) = s
      .trim()
      .split_once('@')
      .ok_or_else(|| invalid(s, "expected <kind>@<when>"))?;

    match kind {
      "hourly" => Ok(Cadence::Hourly { minute: parse_number(s, rest, 59)? }),
      "daily" => {
        let (hour, minute) = parse_time(s, rest)?;
        Ok(Cadence::Daily { hour, minute })
      }
      "weekly" => {
        let (dow, time) = rest
          .split_once(' ')
          .ok_or_else(|| invalid(s, "expected DOW HH:MM"))?;
        let weekday = dow
          .parse::<Weekday>()
          .map_err(|_| invalid(s, &format!("{dow:?} is not a weekday")))?;
        let (hour, minute) = parse_time(s, time)?;
        Ok(Cadence::Weekly { weekday, hour, minute })
      }
      "monthly" => {
        let (day, time) = rest
          .split_once(' ')
          .ok_or_else(|| invalid(s, "expected D HH:MM"))?;
        let day = parse_number(s, day, 28)?;
        if day == 0 {
          return Err(invalid(s, "day of month starts at 1"));
        }
        let (hour, minute) = parse_time(s, time)?;
        Ok(Cadence::Monthly { day, hour, minute })
      }
      other => Err(invalid(s, &format!("unknown kind {other:?}"))),
    }
  }
}

impl fmt::Display for Cadence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Cadence::Hourly { minute } => write!(f, "hourly@{minute:02}"),
      Cadence::Daily { hour, minute } => write!(f, "daily@{hour:02}:{minute:02}"),
      Cadence::Weekly { weekday, hour, minute } => write!(
        f,
        "weekly@{} {hour:02}:{minute:02}",
        weekday.to_string().to_lowercase()
      ),
      Cadence::Monthly { day, hour, minute } => {
        write!(f, "monthly@{day} {hour:02}:{minute:02}")
      }
    }
  }
}

impl TryFrom<String> for Cadence {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<Cadence> for String {
  fn from(value: Cadence) -> Self { value.to_string() }
}
