//! Job record for a forked sub-execution.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a job. Transitions only leave `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Pending,
  Done,
  Failed,
}

impl JobStatus {
  pub fn is_pending(self) -> bool {
    self == JobStatus::Pending
  }

  pub fn as_str(self) -> &'static str {
    match self {
      JobStatus::Pending => "pending",
      JobStatus::Done => "done",
      JobStatus::Failed => "failed",
    }
  }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Handle and status record of one forked sub-execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
  pub id: String,
  pub agent_id: String,
  pub status: JobStatus,
  /// Present only when `status` is `Done`.
  pub result: Option<Value>,
  /// Failure reason, present only when `status` is `Failed`.
  pub error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
  pub fn pending(agent_id: impl Into<String>, id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      agent_id: agent_id.into(),
      status: JobStatus::Pending,
      result: None,
      error: None,
      created_at: Utc::now(),
      finished_at: None,
    }
  }

  /// pending -> done. Returns false (and leaves the record untouched) otherwise.
  pub fn complete(&mut self, result: Value) -> bool {
    if !self.status.is_pending() {
      return false;
    }
    self.status = JobStatus::Done;
    self.result = Some(result);
    self.finished_at = Some(Utc::now());
    true
  }

  /// pending -> failed. Returns false (and leaves the record untouched) otherwise.
  pub fn fail(&mut self, reason: impl Into<String>) -> bool {
    if !self.status.is_pending() {
      return false;
    }
    self.status = JobStatus::Failed;
    self.error = Some(reason.into());
    self.finished_at = Some(Utc::now());
    true
  }
}
