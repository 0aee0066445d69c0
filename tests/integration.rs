//! Integration tests that run the run_flow CLI and/or [GraphRunner] on the JSON graph
//! fixtures in tests/integration/.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde_json::{Value, json};
use streamweave_flow::{
  AgentGraph, ComponentInstance, Connection, GraphRunner, JobStatus, Payload, load_graph,
  remove_component,
};

fn graph_path(name: &str) -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("integration")
    .join(name)
}

fn payload(v: Value) -> Payload {
  match v {
    Value::Object(map) => map,
    _ => panic!("expected object"),
  }
}

/// Runs the built binary. Returns (stdout, stderr, success).
fn run_run_flow(args: &[&str]) -> (String, String, bool) {
  let out = Command::new(env!("CARGO_BIN_EXE_run_flow"))
    .args(args)
    .env("RUST_LOG", "warn")
    .output()
    .expect("run run_flow");
  (
    String::from_utf8_lossy(&out.stdout).into_owned(),
    String::from_utf8_lossy(&out.stderr).into_owned(),
    out.status.success(),
  )
}

// ---- Library path ----

#[tokio::test]
async fn fork_then_join_returns_background_result() {
  let graph = load_graph(&graph_path("fork_join.json")).unwrap();
  let runner = GraphRunner::with_builtins();
  let agent = runner.context("agent-1", graph);

  let out = runner
    .run(&agent, payload(json!({"In": "hello"})))
    .await
    .unwrap();
  let results = out["Results"].as_object().unwrap();
  assert_eq!(results.len(), 1);
  let (job_id, entry) = results.iter().next().unwrap();
  assert_eq!(entry["status"], "done");
  assert_eq!(entry["output"], json!({"Answer": "hello"}));

  assert_eq!(agent.jobs().status("agent-1", job_id), Some(JobStatus::Done));
  assert!(agent.waits().is_empty());
  assert!(agent.graph().contains("join"), "primary graph is not pruned");
}

#[tokio::test]
async fn join_waits_for_every_requested_job() {
  let graph = load_graph(&graph_path("two_forks.json")).unwrap();
  let runner = GraphRunner::with_builtins();
  let agent = runner.context("agent-1", graph);

  let out = runner
    .run(&agent, payload(json!({"In": 1})))
    .await
    .unwrap();
  let results = out["Results"].as_object().unwrap();
  assert_eq!(results.len(), 2);
  for (job_id, entry) in results {
    assert_eq!(entry["status"], "done");
    assert_eq!(entry["output"], json!({"In": 1}));
    assert_eq!(agent.jobs().status("agent-1", job_id), Some(JobStatus::Done));
  }
  assert_eq!(agent.jobs().len(), 2);
}

#[tokio::test]
async fn join_budget_expires_with_pending_jobs() {
  let mut graph = load_graph(&graph_path("fork_join.json")).unwrap();
  let work = graph.component_mut("work").unwrap();
  work.data.insert("delay_ms".to_string(), json!(3_000));
  let join = graph.component_mut("join").unwrap();
  join.data.insert("max_time".to_string(), json!(1));
  let runner = GraphRunner::with_builtins();
  let agent = runner.context("agent-1", graph);

  let out = runner
    .run(&agent, payload(json!({"In": "slow"})))
    .await
    .unwrap();
  let results = out["Results"].as_object().unwrap();
  let (job_id, entry) = results.iter().next().unwrap();
  assert_eq!(entry["status"], "pending");

  assert!(
    agent
      .jobs()
      .wait_idle("agent-1", Duration::from_secs(10))
      .await
  );
  assert_eq!(agent.jobs().status("agent-1", job_id), Some(JobStatus::Done));
}

#[tokio::test]
async fn loop_accepts_comma_separated_string() {
  let graph = load_graph(&graph_path("loop.json")).unwrap();
  let runner = GraphRunner::with_builtins();

  let agent = runner.context("agent-1", graph.clone());
  let from_string = runner
    .run(&agent, payload(json!({"Items": "a,b,c"})))
    .await
    .unwrap();
  let agent = runner.context("agent-1", graph);
  let from_array = runner
    .run(&agent, payload(json!({"Items": ["a", "b", "c"]})))
    .await
    .unwrap();

  assert_eq!(from_string, from_array);
  assert_eq!(
    from_string["Result"],
    json!([{"value": "a"}, {"value": "b"}, {"value": "c"}])
  );
}

#[tokio::test]
async fn loop_parses_json_array_string() {
  let graph = load_graph(&graph_path("loop.json")).unwrap();
  let runner = GraphRunner::with_builtins();
  let agent = runner.context("agent-1", graph);
  let out = runner
    .run(&agent, payload(json!({"Items": "[1,2,3]"})))
    .await
    .unwrap();
  assert_eq!(
    Value::Object(out),
    json!({"Result": [{"value": 1}, {"value": 2}, {"value": 3}]})
  );
}

#[test]
fn pruning_keeps_entry_and_cascades() {
  // A -> B(async) -> C; D depends only on C.
  let mut graph = AgentGraph::new(
    "A",
    vec![
      ComponentInstance::new("A", "Identity"),
      ComponentInstance::new("B", "Async").async_branch(),
      ComponentInstance::new("C", "Identity"),
      ComponentInstance::new("D", "Identity"),
    ],
    vec![
      Connection::new("A", "Out", "B", "In"),
      Connection::new("B", "JobID", "C", "In"),
      Connection::new("C", "Out", "D", "In"),
    ],
  );
  let mut removed = remove_component(&mut graph, "C");
  removed.sort();
  assert_eq!(removed, vec!["C", "D"]);
  assert!(graph.contains("A"));
  assert!(graph.contains("B"));
  assert_eq!(graph.connections, vec![Connection::new("A", "Out", "B", "In")]);

  assert!(remove_component(&mut graph, "A").is_empty());
  assert!(graph.contains("A"));
}

// ---- CLI ----

#[test]
fn cli_runs_loop_fixture() {
  let path = graph_path("loop.json");
  let (stdout, stderr, success) = run_run_flow(&[
    "--input",
    r#"{"Items": [10, 20, 30]}"#,
    path.to_str().expect("path"),
  ]);
  assert!(success, "loop.json should succeed: stderr={stderr}");
  let out: Value = serde_json::from_str(&stdout).expect("stdout is JSON");
  assert_eq!(
    out,
    json!({"Result": [{"value": 10}, {"value": 20}, {"value": 30}]})
  );
}

#[test]
fn cli_runs_fork_join_fixture() {
  let path = graph_path("fork_join.json");
  let (stdout, stderr, success) = run_run_flow(&[
    "--input",
    r#"{"In": 7}"#,
    "--poll-interval-ms",
    "50",
    path.to_str().expect("path"),
  ]);
  assert!(success, "fork_join.json should succeed: stderr={stderr}");
  let out: Value = serde_json::from_str(&stdout).expect("stdout is JSON");
  let entry = out["Results"].as_object().unwrap().values().next().unwrap();
  assert_eq!(entry["status"], "done");
  assert_eq!(entry["output"], json!({"Answer": 7}));
}

#[test]
fn cli_rejects_missing_graph() {
  let (_stdout, stderr, success) = run_run_flow(&["does-not-exist.json"]);
  assert!(!success);
  assert!(stderr.contains("Error loading"));
}

#[test]
fn cli_rejects_non_object_input() {
  let path = graph_path("loop.json");
  let (_stdout, stderr, success) =
    run_run_flow(&["--input", "[1]", path.to_str().expect("path")]);
  assert!(!success);
  assert!(stderr.contains("JSON object"));
}
