//! Error type shared by the controllers, registries and the reference runner.

use thiserror::Error;

/// Errors raised while forking, joining, looping or driving a graph.
///
/// Components never return these to the scheduler directly; they are reported through
/// the `_error` field of the component output.
#[derive(Debug, Error)]
pub enum FlowError {
  /// Fork setup failed before the background execution was launched.
  #[error("fork setup failed: {0}")]
  Setup(String),

  /// The background sub-execution failed.
  #[error("background execution failed: {0}")]
  Execution(String),

  #[error("join failed: {0}")]
  Join(String),

  #[error("loop failed: {0}")]
  Loop(String),

  #[error("component '{0}' not found")]
  ComponentNotFound(String),

  #[error("no implementation registered for component kind '{0}'")]
  UnknownKind(String),

  #[error("invalid graph: {0}")]
  InvalidGraph(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("job '{job_id}' already registered for agent '{agent_id}'")]
  DuplicateJob { agent_id: String, job_id: String },

  #[error("loop '{component_id}' exceeded {limit} iterations")]
  IterationLimit { component_id: String, limit: usize },

  #[error("cycle detected among components: {0:?}")]
  Cycle(Vec<String>),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
