//! Execution context passed to every component invocation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::FlowConfig;
use crate::error::Result;
use crate::registry::{InMemoryRuntimeData, JobRegistry, RuntimeDataStore, WaitSet};
use crate::types::{AgentGraph, Payload};

/// Drives an isolated copy of an agent graph to completion.
///
/// Given a forked context and the id of the component the fork is rooted at, seeds that
/// component with `input` and resolves with the output of the sub-execution.
#[async_trait]
pub trait ForkedExecution: Send + Sync {
  async fn run_forked(&self, agent: Arc<AgentContext>, root_id: &str, input: Payload)
  -> Result<Payload>;
}

/// Hook reporting which components make up an active background branch.
pub trait BranchObserver: Send + Sync {
  fn branch_started(&self, agent_id: &str, job_id: &str, members: &[String]);
}

/// [BranchObserver] that emits a `debug!` event.
pub struct TracingObserver;

impl BranchObserver for TracingObserver {
  fn branch_started(&self, agent_id: &str, job_id: &str, members: &[String]) {
    debug!(agent_id = %agent_id, job_id = %job_id, members = ?members, "background branch active");
  }
}

/// Agent execution context: identity, graph, and the stores shared across invocations.
///
/// A forked context is an independent copy: its own graph and a job id, sharing the
/// stores of the context it was forked from.
pub struct AgentContext {
  pub id: String,
  pub team_id: String,
  pub session_id: String,
  /// Correlation id of the top-level run; scopes wait sets and runtime data.
  pub workflow_request_id: String,
  graph: AgentGraph,
  job_id: Option<String>,
  config: FlowConfig,
  runtime_data: Arc<dyn RuntimeDataStore>,
  jobs: Arc<JobRegistry>,
  waits: Arc<WaitSet>,
  executor: Option<Arc<dyn ForkedExecution>>,
  observer: Arc<dyn BranchObserver>,
}

impl AgentContext {
  /// Context with fresh in-memory stores and a random request id.
  pub fn new(id: impl Into<String>, graph: AgentGraph) -> Self {
    Self {
      id: id.into(),
      team_id: String::new(),
      session_id: uuid::Uuid::new_v4().to_string(),
      workflow_request_id: uuid::Uuid::new_v4().to_string(),
      graph,
      job_id: None,
      config: FlowConfig::default(),
      runtime_data: Arc::new(InMemoryRuntimeData::new()),
      jobs: Arc::new(JobRegistry::new()),
      waits: Arc::new(WaitSet::new()),
      executor: None,
      observer: Arc::new(TracingObserver),
    }
  }

  pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
    self.team_id = team_id.into();
    self
  }

  pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
    self.session_id = session_id.into();
    self
  }

  pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
    self.workflow_request_id = request_id.into();
    self
  }

  pub fn with_config(mut self, config: FlowConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_runtime_data(mut self, store: Arc<dyn RuntimeDataStore>) -> Self {
    self.runtime_data = store;
    self
  }

  pub fn with_jobs(mut self, jobs: Arc<JobRegistry>) -> Self {
    self.jobs = jobs;
    self
  }

  pub fn with_waits(mut self, waits: Arc<WaitSet>) -> Self {
    self.waits = waits;
    self
  }

  pub fn with_executor(mut self, executor: Arc<dyn ForkedExecution>) -> Self {
    self.executor = Some(executor);
    self
  }

  pub fn with_observer(mut self, observer: Arc<dyn BranchObserver>) -> Self {
    self.observer = observer;
    self
  }

  /// Independent copy rooted at a fork: takes ownership of `graph`, carries `job_id`,
  /// and shares every store with `self`.
  pub fn fork(&self, graph: AgentGraph, job_id: impl Into<String>) -> Self {
    let job_id = job_id.into();
    Self {
      id: self.id.clone(),
      team_id: self.team_id.clone(),
      session_id: self.session_id.clone(),
      workflow_request_id: format!("{}:{}", self.workflow_request_id, job_id),
      graph,
      job_id: Some(job_id),
      config: self.config.clone(),
      runtime_data: self.runtime_data.clone(),
      jobs: self.jobs.clone(),
      waits: self.waits.clone(),
      executor: self.executor.clone(),
      observer: self.observer.clone(),
    }
  }

  pub fn graph(&self) -> &AgentGraph {
    &self.graph
  }

  /// Job id of the sub-execution this context runs, when forked.
  pub fn job_id(&self) -> Option<&str> {
    self.job_id.as_deref()
  }

  pub fn is_forked(&self) -> bool {
    self.job_id.is_some()
  }

  pub fn config(&self) -> &FlowConfig {
    &self.config
  }

  pub fn jobs(&self) -> &Arc<JobRegistry> {
    &self.jobs
  }

  pub fn waits(&self) -> &Arc<WaitSet> {
    &self.waits
  }

  pub fn executor(&self) -> Option<&Arc<dyn ForkedExecution>> {
    self.executor.as_ref()
  }

  pub fn get_runtime_data(&self, component_id: &str) -> Option<Value> {
    self.runtime_data.get(&self.workflow_request_id, component_id)
  }

  pub fn update_runtime_data(&self, component_id: &str, patch: Value) {
    self
      .runtime_data
      .update(&self.workflow_request_id, component_id, patch)
  }

  /// Drops the runtime data of this run.
  pub fn clear_runtime_data(&self) {
    self.runtime_data.clear_scope(&self.workflow_request_id)
  }

  pub fn report_branch(&self, job_id: &str, members: &[String]) {
    self.observer.branch_started(&self.id, job_id, members)
  }
}
