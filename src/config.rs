//! Runtime settings for the controllers and the reference runner.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Env var overriding [FlowConfig::poll_interval_ms].
pub const ENV_POLL_INTERVAL_MS: &str = "FLOW_POLL_INTERVAL_MS";
/// Env var overriding [FlowConfig::max_loop_iterations].
pub const ENV_MAX_LOOP_ITERATIONS: &str = "FLOW_MAX_LOOP_ITERATIONS";
/// Env var overriding [FlowConfig::default_jobs_count].
pub const ENV_DEFAULT_JOBS_COUNT: &str = "FLOW_DEFAULT_JOBS_COUNT";
/// Env var overriding [FlowConfig::default_max_time_secs].
pub const ENV_DEFAULT_MAX_TIME_SECS: &str = "FLOW_DEFAULT_MAX_TIME_SECS";

pub const JOBS_COUNT_RANGE: (u64, u64) = (1, 100);
pub const MAX_TIME_RANGE_SECS: (u64, u64) = (1, 21_600);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
  /// Fallback tick of the join poll loop; completions wake it earlier.
  pub poll_interval_ms: u64,
  pub default_jobs_count: u64,
  pub default_max_time_secs: u64,
  /// Safety cap on iterations of one loop in the reference runner.
  pub max_loop_iterations: usize,
}

impl Default for FlowConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: 1000,
      default_jobs_count: 1,
      default_max_time_secs: 1,
      max_loop_iterations: 10_000,
    }
  }
}

impl FlowConfig {
  /// Defaults overridden by `FLOW_*` environment variables.
  pub fn from_env() -> Self {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Defaults overridden by whatever `lookup` returns for the `FLOW_*` keys.
  /// Unparsable values are logged and ignored.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let mut cfg = Self::default();
    if let Some(v) = parse_var(&lookup, ENV_POLL_INTERVAL_MS) {
      cfg.poll_interval_ms = v;
    }
    if let Some(v) = parse_var(&lookup, ENV_MAX_LOOP_ITERATIONS) {
      cfg.max_loop_iterations = v;
    }
    if let Some(v) = parse_var(&lookup, ENV_DEFAULT_JOBS_COUNT) {
      cfg.default_jobs_count = v;
    }
    if let Some(v) = parse_var(&lookup, ENV_DEFAULT_MAX_TIME_SECS) {
      cfg.default_max_time_secs = v;
    }
    cfg
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms.max(1))
  }
}

fn parse_var<T: std::str::FromStr>(
  lookup: &impl Fn(&str) -> Option<String>,
  key: &str,
) -> Option<T> {
  let raw = lookup(key)?;
  match raw.trim().parse() {
    Ok(v) => Some(v),
    Err(_) => {
      warn!(key = %key, value = %raw, "ignoring unparsable setting");
      None
    }
  }
}

/// Clamps `v` into the inclusive `range`.
pub(crate) fn clamp_to(v: u64, range: (u64, u64)) -> u64 {
  v.clamp(range.0, range.1)
}
