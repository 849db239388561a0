//! Runtime configuration for the Stride server binary.
//!
//! Loaded by `main` from an optional TOML file layered under
//! `STRIDE_`-prefixed environment variables, e.g. `STRIDE_PORT=9000` or
//! `STRIDE_SCHEDULER__ENABLED=false`. Every field has a default.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stride_engine::{ReconcileSettings, Schedule, cadence::Cadence};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub scheduler:  SchedulerConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/stride/stride.db"),
      scheduler:  SchedulerConfig::default(),
    }
  }
}

/// Reconciliation settings and job cadences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
  /// When `false` no job runs on its own; manual triggers still work.
  pub enabled:            bool,
  pub active_window_days: u32,
  pub retention_days:     u32,
  pub daily:              Cadence,
  pub hourly:             Cadence,
  pub weekly:             Cadence,
  pub monthly:            Cadence,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    let settings = ReconcileSettings::default();
    let schedule = Schedule::default();
    Self {
      enabled:            true,
      active_window_days: settings.active_window_days,
      retention_days:     settings.retention_days,
      daily:              schedule.daily,
      hourly:             schedule.hourly,
      weekly:             schedule.weekly,
      monthly:            schedule.monthly,
    }
  }
}

impl SchedulerConfig {
  pub fn settings(&self) -> ReconcileSettings {
    ReconcileSettings {
      active_window_days: self.active_window_days,
      retention_days:     self.retention_days,
    }
  }

  pub fn schedule(&self) -> Schedule {
    Schedule {
      daily:   self.daily,
      hourly:  self.hourly,
      weekly:  self.weekly,
      monthly: self.monthly,
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
