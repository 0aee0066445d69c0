//! Tests for `AsyncNode`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{AsyncNode, Component, ERROR_KEY, JOB_ID_PORT};
use crate::agent::{AgentContext, BranchObserver, ForkedExecution};
use crate::error::{FlowError, Result};
use crate::types::{AgentGraph, ComponentInstance, Connection, JobStatus, Payload};

enum Behavior {
  Hang,
  Succeed,
  Fail(&'static str),
}

struct Seen {
  root_id: String,
  job_id: Option<String>,
  components: Vec<String>,
  root_forked: bool,
}

struct StubExecutor {
  behavior: Behavior,
  seen: Mutex<Vec<Seen>>,
}

impl StubExecutor {
  fn new(behavior: Behavior) -> Arc<Self> {
    Arc::new(Self {
      behavior,
      seen: Mutex::new(Vec::new()),
    })
  }
}

#[async_trait]
impl ForkedExecution for StubExecutor {
  async fn run_forked(
    &self,
    agent: Arc<AgentContext>,
    root_id: &str,
    input: Payload,
  ) -> Result<Payload> {
    let mut components: Vec<String> = agent.graph().components.keys().cloned().collect();
    components.sort();
    self.seen.lock().unwrap().push(Seen {
      root_id: root_id.to_string(),
      job_id: agent.job_id().map(str::to_string),
      components,
      root_forked: agent.graph().component(root_id).is_some_and(|c| c.is_forked()),
    });
    match self.behavior {
      Behavior::Hang => std::future::pending::<Result<Payload>>().await,
      Behavior::Succeed => {
        let mut out = input;
        out.insert("done".to_string(), json!(true));
        Ok(out)
      }
      Behavior::Fail(reason) => Err(FlowError::Execution(reason.to_string())),
    }
  }
}

#[derive(Default)]
struct RecordingObserver {
  branches: Mutex<Vec<(String, Vec<String>)>>,
}

impl BranchObserver for RecordingObserver {
  fn branch_started(&self, _agent_id: &str, job_id: &str, members: &[String]) {
    self
      .branches
      .lock()
      .unwrap()
      .push((job_id.to_string(), members.to_vec()));
  }
}

/// A -> B(Async); B.JobID -> C -> D; B.Out -> E (async).
fn fork_graph() -> AgentGraph {
  AgentGraph::new(
    "A",
    vec![
      ComponentInstance::new("A", "Identity"),
      ComponentInstance::new("B", "Async"),
      ComponentInstance::new("C", "Await"),
      ComponentInstance::new("D", "Identity"),
      ComponentInstance::new("E", "Identity").async_branch(),
    ],
    vec![
      Connection::new("A", "Out", "B", "In"),
      Connection::new("B", "JobID", "C", "Jobs"),
      Connection::new("C", "Results", "D", "In"),
      Connection::new("B", "In", "E", "In"),
    ],
  )
}

fn agent_with(executor: Arc<StubExecutor>) -> AgentContext {
  AgentContext::new("agent-1", fork_graph()).with_executor(executor)
}

fn input() -> Payload {
  let mut p = Payload::new();
  p.insert("In".to_string(), json!(1));
  p
}

fn job_id_of(out: &Payload) -> String {
  out[JOB_ID_PORT].as_str().unwrap().to_string()
}

#[tokio::test]
async fn each_fork_registers_a_distinct_pending_job() {
  let agent = agent_with(StubExecutor::new(Behavior::Hang));
  let config = agent.graph().component("B").unwrap().clone();
  let node = AsyncNode::new();

  let mut ids = HashSet::new();
  for _ in 0..3 {
    let out = node.process(input(), &config, &agent).await;
    assert_eq!(out.len(), 1, "only the job handle is returned");
    ids.insert(job_id_of(&out));
  }
  assert_eq!(ids.len(), 3);
  for id in &ids {
    assert_eq!(agent.jobs().status("agent-1", id), Some(JobStatus::Pending));
  }
  assert_eq!(agent.jobs().pending_for_agent("agent-1"), 3);
}

#[tokio::test]
async fn forked_copy_is_pruned_and_primary_graph_untouched() {
  let exec = StubExecutor::new(Behavior::Succeed);
  let agent = agent_with(exec.clone());
  let config = agent.graph().component("B").unwrap().clone();

  let out = AsyncNode::new().process(input(), &config, &agent).await;
  let job_id = job_id_of(&out);
  assert!(agent.jobs().wait_idle("agent-1", Duration::from_secs(5)).await);

  let seen = exec.seen.lock().unwrap();
  assert_eq!(seen.len(), 1);
  assert_eq!(seen[0].root_id, "B");
  assert_eq!(seen[0].job_id.as_deref(), Some(job_id.as_str()));
  assert_eq!(seen[0].components, vec!["A", "B", "E"]);
  assert!(seen[0].root_forked);

  assert!(agent.graph().contains("C"));
  assert!(agent.graph().contains("D"));
  assert!(!agent.graph().component("B").unwrap().is_forked());
}

#[tokio::test]
async fn background_success_completes_job() {
  let agent = agent_with(StubExecutor::new(Behavior::Succeed));
  let config = agent.graph().component("B").unwrap().clone();

  let out = AsyncNode::new().process(input(), &config, &agent).await;
  let job_id = job_id_of(&out);
  assert!(agent.jobs().wait_idle("agent-1", Duration::from_secs(5)).await);

  let job = agent.jobs().get("agent-1", &job_id).unwrap();
  assert_eq!(job.status, JobStatus::Done);
  assert_eq!(job.result, Some(json!({"In": 1, "done": true})));
  assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn background_error_fails_job_with_reason() {
  let agent = agent_with(StubExecutor::new(Behavior::Fail("api unreachable")));
  let config = agent.graph().component("B").unwrap().clone();

  let out = AsyncNode::new().process(input(), &config, &agent).await;
  let job_id = job_id_of(&out);
  assert!(agent.jobs().wait_idle("agent-1", Duration::from_secs(5)).await);

  let job = agent.jobs().get("agent-1", &job_id).unwrap();
  assert_eq!(job.status, JobStatus::Failed);
  assert!(job.error.unwrap().contains("api unreachable"));
}

#[tokio::test]
async fn branch_members_are_reported() {
  let observer = Arc::new(RecordingObserver::default());
  let agent = agent_with(StubExecutor::new(Behavior::Hang)).with_observer(observer.clone());
  let config = agent.graph().component("B").unwrap().clone();

  let out = AsyncNode::new().process(input(), &config, &agent).await;
  let branches = observer.branches.lock().unwrap();
  assert_eq!(branches.len(), 1);
  assert_eq!(branches[0].0, job_id_of(&out));
  assert_eq!(branches[0].1, vec!["E".to_string()]);
}

#[tokio::test]
async fn missing_executor_reports_error() {
  let agent = AgentContext::new("agent-1", fork_graph());
  let config = agent.graph().component("B").unwrap().clone();

  let out = AsyncNode::new().process(input(), &config, &agent).await;
  assert!(out.contains_key(ERROR_KEY));
  assert!(!out.contains_key(JOB_ID_PORT));
  assert!(agent.jobs().is_empty());
}

#[tokio::test]
async fn forked_reentry_relays_declared_inputs() {
  let base = AgentContext::new("agent-1", fork_graph());
  let mut graph = fork_graph();
  graph.component_mut("B").unwrap().mark_forked();
  let forked = base.fork(graph, "job-7");
  let config = ComponentInstance::new("B", "Async")
    .with_inputs(&["In"])
    .with_data("forked", json!(true));

  let mut input = input();
  input.insert("Extra".to_string(), json!("x"));
  let out = AsyncNode::new().process(input, &config, &forked).await;
  assert_eq!(Value::Object(out), json!({"In": 1, "JobID": "job-7"}));
  assert!(base.jobs().is_empty(), "re-entry registers nothing");
}

#[tokio::test]
async fn forked_reentry_without_declared_inputs_relays_all() {
  let base = AgentContext::new("agent-1", fork_graph());
  let forked = base.fork(fork_graph(), "job-8");
  let config = ComponentInstance::new("B", "Async").with_data("forked", json!(true));

  let mut input = input();
  input.insert("Extra".to_string(), json!("x"));
  let out = AsyncNode::new().process(input, &config, &forked).await;
  assert_eq!(
    Value::Object(out),
    json!({"In": 1, "Extra": "x", "JobID": "job-8"})
  );
}
