//! Join controller: waits for a set of jobs until a completion threshold or a time budget.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::agent::AgentContext;
use crate::config::{FlowConfig, JOBS_COUNT_RANGE, MAX_TIME_RANGE_SECS, clamp_to};
use crate::error::{FlowError, Result};
use crate::nodes::component::{Component, ERROR_KEY, data_u64};
use crate::registry::WaitKey;
use crate::types::{ComponentInstance, JobStatus, Payload};

pub const JOBS_INPUT: &str = "Jobs";
pub const RESULTS_OUTPUT: &str = "Results";
/// Status reported for ids the registry has never seen.
pub const UNKNOWN_JOB: &str = "unknown_job";

/// Resolved join settings of one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSettings {
  /// Number of requested jobs that must leave `pending`.
  pub threshold: usize,
  pub max_wait: Duration,
  /// Fallback re-check interval; registry changes wake the loop earlier.
  pub tick: Duration,
}

impl JoinSettings {
  /// Reads `jobs_count` and `max_time` from the component data, clamped to their ranges.
  /// A threshold above the number of requested ids cannot be met, so such a join waits out
  /// its whole budget.
  pub fn resolve(config: &ComponentInstance, flow: &FlowConfig) -> Self {
    let jobs_count = clamp_to(
      data_u64(config, "jobs_count").unwrap_or(flow.default_jobs_count),
      JOBS_COUNT_RANGE,
    ) as usize;
    let max_time = clamp_to(
      data_u64(config, "max_time").unwrap_or(flow.default_max_time_secs),
      MAX_TIME_RANGE_SECS,
    );
    Self {
      threshold: jobs_count,
      max_wait: Duration::from_secs(max_time),
      tick: flow.poll_interval(),
    }
  }
}

/// Normalizes the `Jobs` input (one id or an array of ids) into distinct ids, in order.
#[instrument(level = "trace")]
pub(crate) fn parse_job_ids(jobs: Option<&Value>) -> Result<Vec<String>> {
  let raw: Vec<&Value> = match jobs {
    None | Some(Value::Null) => vec![],
    Some(Value::Array(items)) => items.iter().collect(),
    Some(other) => vec![other],
  };
  let mut ids: Vec<String> = Vec::with_capacity(raw.len());
  for v in raw {
    let id = match v {
      Value::String(s) => s.clone(),
      Value::Number(n) => n.to_string(),
      other => {
        return Err(FlowError::InvalidInput(format!(
          "job id must be a string, got {other}"
        )));
      }
    };
    if !ids.contains(&id) {
      ids.push(id);
    }
  }
  Ok(ids)
}

pub struct AwaitNode;

impl Default for AwaitNode {
  fn default() -> Self {
    Self::new()
  }
}

impl AwaitNode {
  pub fn new() -> Self {
    Self
  }

  /// Waits until `threshold` of `ids` have left `pending` or the budget runs out.
  /// Only the ids of this call gate the wait, not the accumulated wait set entry.
  pub(crate) async fn wait_for(
    &self,
    ids: &[String],
    settings: JoinSettings,
    agent: &AgentContext,
  ) -> usize {
    let jobs = agent.jobs();
    let mut changes = jobs.subscribe();
    let deadline = Instant::now() + settings.max_wait;
    loop {
      let finished = ids
        .iter()
        .filter(|id| jobs.status(&agent.id, id) != Some(JobStatus::Pending))
        .count();
      if finished >= settings.threshold {
        return finished;
      }
      let now = Instant::now();
      if now >= deadline {
        debug!(finished, threshold = settings.threshold, "join budget exhausted");
        return finished;
      }
      let tick = settings.tick.min(deadline - now);
      tokio::select! {
        changed = changes.changed() => {
          if changed.is_err() {
            tokio::time::sleep(tick).await;
          }
        }
        _ = tokio::time::sleep(tick) => {}
      }
    }
  }

  /// `Results[id] = {output, status}` for every requested id, read at resolution time.
  pub(crate) fn collect_results(ids: &[String], agent: &AgentContext) -> Value {
    let mut results = serde_json::Map::new();
    for id in ids {
      let entry = match agent.jobs().get(&agent.id, id) {
        Some(job) => {
          let mut e = json!({
            "output": job.result.unwrap_or(Value::Null),
            "status": job.status.as_str(),
          });
          if let Some(reason) = job.error {
            e["error"] = Value::String(reason);
          }
          e
        }
        None => json!({ "output": Value::Null, "status": UNKNOWN_JOB }),
      };
      results.insert(id.clone(), entry);
    }
    Value::Object(results)
  }

  async fn join(
    &self,
    key: &WaitKey,
    input: &Payload,
    config: &ComponentInstance,
    agent: &AgentContext,
  ) -> Result<Payload> {
    let ids = parse_job_ids(input.get(JOBS_INPUT)).map_err(|e| FlowError::Join(e.to_string()))?;
    agent.waits().append(key, ids.iter().cloned());
    let settings = JoinSettings::resolve(config, agent.config());
    debug!(
      component_id = %config.id,
      jobs = ?ids,
      threshold = settings.threshold,
      max_wait_secs = settings.max_wait.as_secs(),
      "joining"
    );
    let finished = self.wait_for(&ids, settings, agent).await;
    debug!(component_id = %config.id, finished, requested = ids.len(), "join resolved");

    let mut out = Payload::new();
    out.insert(RESULTS_OUTPUT.to_string(), Self::collect_results(&ids, agent));
    Ok(out)
  }
}

#[async_trait]
impl Component for AwaitNode {
  fn kind(&self) -> &str {
    "Await"
  }

  async fn process(
    &self,
    input: Payload,
    config: &ComponentInstance,
    agent: &AgentContext,
  ) -> Payload {
    let key = WaitKey::new(&agent.id, &config.id, &agent.workflow_request_id);
    let outcome = self.join(&key, &input, config, agent).await;
    agent.waits().clear(&key);
    match outcome {
      Ok(out) => out,
      Err(e) => {
        warn!(component_id = %config.id, error = %e, "join failed");
        let mut out = Payload::new();
        out.insert(RESULTS_OUTPUT.to_string(), Value::Object(serde_json::Map::new()));
        out.insert(ERROR_KEY.to_string(), Value::String(e.to_string()));
        out
      }
    }
  }
}
