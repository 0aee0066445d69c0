//! Fork controller: carves a background branch out of the graph and runs it as a job.
//!
//! First activation (primary path): copy the agent context rooted at this component, cut
//! the job-handle branch out of the copy, register a pending job, launch the copy in the
//! background and return `{JobID}` at once. Re-entry inside the copy (forked path): relay
//! the inputs plus the ambient job id.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::agent::AgentContext;
use crate::error::{FlowError, Result};
use crate::graph_pruner::prune_job_branch;
use crate::nodes::component::{Component, error_output};
use crate::registry::JobRegistry;
use crate::types::{ComponentInstance, Payload};

/// Output port carrying the job handle.
pub const JOB_ID_PORT: &str = "JobID";

/// Marks a job failed if the background task ends (or unwinds) without settling it.
struct SettleOnDrop {
  jobs: Arc<JobRegistry>,
  agent_id: String,
  job_id: String,
}

impl Drop for SettleOnDrop {
  fn drop(&mut self) {
    if self.jobs.fail(
      &self.agent_id,
      &self.job_id,
      "background execution ended without a result",
    ) {
      warn!(job_id = %self.job_id, "background execution did not settle its job");
    }
  }
}

pub struct AsyncNode;

impl Default for AsyncNode {
  fn default() -> Self {
    Self::new()
  }
}

impl AsyncNode {
  pub fn new() -> Self {
    Self
  }

  /// Primary path. Pruning completes before the job is registered, and registration
  /// before launch, so a joiner never sees a job whose subgraph is still changing.
  pub(crate) fn fork(
    &self,
    input: Payload,
    config: &ComponentInstance,
    agent: &AgentContext,
  ) -> Result<Payload> {
    let executor = agent
      .executor()
      .cloned()
      .ok_or_else(|| FlowError::Setup("no forked-execution collaborator configured".into()))?;

    let job_id = Uuid::new_v4().to_string();
    let mut graph = agent.graph().clone();
    graph
      .component_mut(&config.id)
      .ok_or_else(|| FlowError::Setup(format!("component '{}' is not in the graph", config.id)))?
      .mark_forked();
    let pruned = prune_job_branch(&mut graph, &config.id, JOB_ID_PORT);
    debug!(component_id = %config.id, pruned = ?pruned, "forked graph pruned");

    let mut members: Vec<String> = graph
      .reachable_from([config.id.as_str()])
      .into_iter()
      .filter(|id| graph.component(id).is_some_and(|c| c.async_branch))
      .collect();
    members.sort();

    let forked = Arc::new(agent.fork(graph, job_id.clone()));
    agent
      .jobs()
      .register(&agent.id, &job_id)
      .map_err(|e| FlowError::Setup(e.to_string()))?;
    forked.report_branch(&job_id, &members);

    let guard = SettleOnDrop {
      jobs: agent.jobs().clone(),
      agent_id: agent.id.clone(),
      job_id: job_id.clone(),
    };
    let root_id = config.id.clone();
    let span = info_span!("background_job", agent_id = %agent.id, job_id = %job_id);
    tokio::spawn(
      async move {
        let outcome = executor.run_forked(forked, &root_id, input).await;
        match outcome {
          Ok(output) => {
            guard
              .jobs
              .complete(&guard.agent_id, &guard.job_id, Value::Object(output));
          }
          Err(e) => {
            guard.jobs.fail(&guard.agent_id, &guard.job_id, e.to_string());
          }
        }
        drop(guard);
      }
      .instrument(span),
    );

    info!(component_id = %config.id, job_id = %job_id, "background job launched");
    let mut out = Payload::new();
    out.insert(JOB_ID_PORT.to_string(), Value::String(job_id));
    Ok(out)
  }

  /// Forked path: declared inputs (all inputs when none are declared) plus the job id.
  pub(crate) fn relay(input: Payload, config: &ComponentInstance, agent: &AgentContext) -> Payload {
    let mut out = if config.inputs.is_empty() {
      input
    } else {
      config
        .input_names()
        .filter_map(|name| input.get(name).map(|v| (name.to_string(), v.clone())))
        .collect()
    };
    let job_id = agent.job_id().map(|j| Value::String(j.to_string()));
    out.insert(JOB_ID_PORT.to_string(), job_id.unwrap_or(Value::Null));
    out
  }
}

#[async_trait]
impl Component for AsyncNode {
  fn kind(&self) -> &str {
    "Async"
  }

  async fn process(
    &self,
    input: Payload,
    config: &ComponentInstance,
    agent: &AgentContext,
  ) -> Payload {
    if config.is_forked() {
      return Self::relay(input, config, agent);
    }
    match self.fork(input, config, agent) {
      Ok(out) => out,
      Err(e) => {
        warn!(component_id = %config.id, error = %e, "fork setup failed");
        error_output(&e)
      }
    }
  }
}
