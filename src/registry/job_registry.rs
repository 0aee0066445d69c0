//! Job registry: (agent, job id) -> status/result of forked sub-executions.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{FlowError, Result};
use crate::types::{Job, JobStatus};

type JobKey = (String, String);

fn key(agent_id: &str, job_id: &str) -> JobKey {
  (agent_id.to_string(), job_id.to_string())
}

/// Store of job records shared by the fork and join controllers of one runtime.
///
/// Every status transition bumps a change counter; joiners subscribe to it instead of
/// relying solely on a fixed poll tick.
pub struct JobRegistry {
  jobs: DashMap<JobKey, Job>,
  changes: watch::Sender<u64>,
}

impl Default for JobRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl JobRegistry {
  pub fn new() -> Self {
    let (changes, _) = watch::channel(0);
    Self {
      jobs: DashMap::new(),
      changes,
    }
  }

  /// Registers a pending job. Ids are unique per agent for the lifetime of the registry.
  pub fn register(&self, agent_id: &str, job_id: &str) -> Result<()> {
    let k = key(agent_id, job_id);
    if self.jobs.contains_key(&k) {
      return Err(FlowError::DuplicateJob {
        agent_id: agent_id.to_string(),
        job_id: job_id.to_string(),
      });
    }
    self.jobs.insert(k, Job::pending(agent_id, job_id));
    info!(agent_id = %agent_id, job_id = %job_id, "job registered");
    self.bump();
    Ok(())
  }

  /// Marks a pending job done with its result. Returns whether the transition happened.
  pub fn complete(&self, agent_id: &str, job_id: &str, result: Value) -> bool {
    let changed = match self.jobs.get_mut(&key(agent_id, job_id)) {
      Some(mut job) => job.complete(result),
      None => false,
    };
    if changed {
      info!(agent_id = %agent_id, job_id = %job_id, "job done");
      self.bump();
    } else {
      debug!(agent_id = %agent_id, job_id = %job_id, "complete ignored; job not pending");
    }
    changed
  }

  /// Marks a pending job failed. Returns whether the transition happened.
  pub fn fail(&self, agent_id: &str, job_id: &str, reason: impl Into<String>) -> bool {
    let reason = reason.into();
    let changed = match self.jobs.get_mut(&key(agent_id, job_id)) {
      Some(mut job) => job.fail(reason.clone()),
      None => false,
    };
    if changed {
      warn!(agent_id = %agent_id, job_id = %job_id, reason = %reason, "job failed");
      self.bump();
    }
    changed
  }

  pub fn get(&self, agent_id: &str, job_id: &str) -> Option<Job> {
    self.jobs.get(&key(agent_id, job_id)).map(|j| j.clone())
  }

  pub fn status(&self, agent_id: &str, job_id: &str) -> Option<JobStatus> {
    self.jobs.get(&key(agent_id, job_id)).map(|j| j.status)
  }

  pub fn jobs_for_agent(&self, agent_id: &str) -> Vec<Job> {
    self
      .jobs
      .iter()
      .filter(|e| e.key().0 == agent_id)
      .map(|e| e.value().clone())
      .collect()
  }

  pub fn pending_for_agent(&self, agent_id: &str) -> usize {
    self
      .jobs
      .iter()
      .filter(|e| e.key().0 == agent_id && e.value().status.is_pending())
      .count()
  }

  pub fn len(&self) -> usize {
    self.jobs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.jobs.is_empty()
  }

  /// Receiver that observes every registration and status transition after this call.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.changes.subscribe()
  }

  /// Waits until the agent has no pending jobs or `budget` elapses. Returns true when idle.
  pub async fn wait_idle(&self, agent_id: &str, budget: Duration) -> bool {
    let mut rx = self.subscribe();
    let drained = async {
      while self.pending_for_agent(agent_id) > 0 {
        if rx.changed().await.is_err() {
          break;
        }
      }
    };
    let _ = tokio::time::timeout(budget, drained).await;
    self.pending_for_agent(agent_id) == 0
  }

  fn bump(&self) {
    self.changes.send_modify(|v| *v = v.wrapping_add(1));
  }
}
