//! Time source injected into every service, so tests can pin "now".

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, NaiveDate, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// The current UTC calendar day.
  fn today(&self) -> NaiveDate { self.now().date_naive() }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
  micros: AtomicI64,
}

impl FixedClock {
  pub fn new(at: DateTime<Utc>) -> Self {
    Self { micros: AtomicI64::new(at.timestamp_micros()) }
  }

  pub fn set(&self, at: DateTime<Utc>) {
    self.micros.store(at.timestamp_micros(), Ordering::SeqCst);
  }

  pub fn advance(&self, by: Duration) {
    let step = by.num_microseconds().unwrap_or(i64::MAX);
    self.micros.fetch_add(step, Ordering::SeqCst);
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst))
      .unwrap_or_default()
  }
}
