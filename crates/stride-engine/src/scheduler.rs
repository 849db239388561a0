//! Reconciliation Scheduler: runs each job on its cadence and on demand.
//!
//! Every job has a guard so two runs of the same job never overlap. A
//! scheduled tick that finds its job still running is skipped, and a manual
//! trigger fails with [`Error::JobAlreadyRunning`]. Different jobs may run
//! concurrently; each student's unit of work is its own transaction.

use std::{
  collections::BTreeMap,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use stride_core::{Error, Result, clock::Clock, store::ProgressStore};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{
  cadence::Cadence,
  reconcile::{JobKind, JobReport, Reconciler},
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// When each job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Schedule {
  pub daily:   Cadence,
  pub hourly:  Cadence,
  pub weekly:  Cadence,
  pub monthly: Cadence,
}

impl Default for Schedule {
  fn default() -> Self {
    Self {
      daily:   Cadence::Daily { hour: 2, minute: 0 },
      hourly:  Cadence::Hourly { minute: 5 },
      weekly:  Cadence::Weekly { weekday: chrono::Weekday::Sun, hour: 3, minute: 0 },
      monthly: Cadence::Monthly { day: 1, hour: 4, minute: 0 },
    }
  }
}

impl Schedule {
  pub fn cadence(&self, job: JobKind) -> Cadence {
    match job {
      JobKind::DailyReconciliation => self.daily,
      JobKind::HourlyStreakRefresh => self.hourly,
      JobKind::WeeklyCleanup => self.weekly,
      JobKind::MonthlyFullRecalculation => self.monthly,
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
  Idle,
  Running,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
  pub job:              JobKind,
  pub cadence:          Cadence,
  pub state:            JobState,
  pub last_started_at:  Option<DateTime<Utc>>,
  pub last_finished_at: Option<DateTime<Utc>>,
  pub next_run_at:      Option<DateTime<Utc>>,
  pub last_report:      Option<JobReport>,
  pub last_error:       Option<String>,
  pub runs:             u64,
}

struct JobSlot {
  guard:  tokio::sync::Mutex<()>,
  status: Mutex<JobStatus>,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

pub struct Scheduler<S> {
  reconciler: Arc<Reconciler<S>>,
  clock:      Arc<dyn Clock>,
  slots:      BTreeMap<JobKind, JobSlot>,
}

impl<S: ProgressStore + 'static> Scheduler<S> {
  pub fn new(
    reconciler: Arc<Reconciler<S>>,
    clock: Arc<dyn Clock>,
    schedule: Schedule,
  ) -> Self {
    let slots = JobKind::iter()
      .map(|job| {
        let status = JobStatus {
          job,
          cadence: schedule.cadence(job),
          state: JobState::Idle,
          last_started_at: None,
          last_finished_at: None,
          next_run_at: None,
          last_report: None,
          last_error: None,
          runs: 0,
        };
        (job, JobSlot { guard: tokio::sync::Mutex::new(()), status: Mutex::new(status) })
      })
      .collect();
    Self { reconciler, clock, slots }
  }

  /// Run `job` now, unless a run of the same job is in progress.
  pub async fn trigger(&self, job: JobKind) -> Result<JobReport> {
    let slot = self.slot(job)?;
    let Ok(_running) = slot.guard.try_lock() else {
      return Err(Error::JobAlreadyRunning(job.to_string()));
    };

    self.update(slot, |s| {
      s.state = JobState::Running;
      s.last_started_at = Some(self.clock.now());
    });

    let result = self.reconciler.run(job).await;

    let finished = self.clock.now();
    self.update(slot, |s| {
      s.state = JobState::Idle;
      s.last_finished_at = Some(finished);
      s.runs += 1;
      match &result {
        Ok(report) => {
          s.last_report = Some(report.clone());
          s.last_error = None;
        }
        Err(err) => s.last_error = Some(err.to_string()),
      }
    });
    result
  }

  /// The status of every job, with next run times computed from now.
  pub fn status(&self) -> Vec<JobStatus> {
    let now = self.clock.now();
    self
      .slots
      .values()
      .map(|slot| {
        let mut status = lock(&slot.status).clone();
        status.next_run_at = status.cadence.next_after(now);
        status
      })
      .collect()
  }

  /// Spawn one timer task per job. The tasks exit once `shutdown` flips to
  /// `true` or its sender is dropped.
  pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    JobKind::iter()
      .map(|job| {
        let scheduler = Arc::clone(&self);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run_loop(job, shutdown).await })
      })
      .collect()
  }

  async fn run_loop(&self, job: JobKind, mut shutdown: watch::Receiver<bool>) {
    let Ok(slot) = self.slot(job) else { return };
    let cadence = lock(&slot.status).cadence;
    info!(job = %job, cadence = %cadence, "scheduling reconciliation job");

    loop {
      let now = self.clock.now();
      let Some(next) = cadence.next_after(now) else {
        error!(job = %job, cadence = %cadence, "cadence has no next run");
        return;
      };
      let wait = (next - now).to_std().unwrap_or_default();

      tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            info!(job = %job, "reconciliation job loop stopped");
            return;
          }
          continue;
        }
      }

      match self.trigger(job).await {
        Ok(_) => {}
        Err(Error::JobAlreadyRunning(_)) => {
          warn!(job = %job, "previous run still in progress, skipping tick");
        }
        Err(err) => error!(job = %job, error = %err, "reconciliation job failed"),
      }
    }
  }

  fn slot(&self, job: JobKind) -> Result<&JobSlot> {
    self
      .slots
      .get(&job)
      .ok_or_else(|| Error::InvalidInput(format!("unknown job {job}")))
  }

  fn update(&self, slot: &JobSlot, f: impl FnOnce(&mut JobStatus)) {
    f(&mut lock(&slot.status));
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
