//! CLI: run an agent graph from a JSON file.
//!
//! Loads and validates the graph, runs it from its entry with the given input, prints
//! the merged sink output as JSON, then optionally waits for background jobs to settle.
//!
//! Usage: `run_flow [OPTIONS] <path-to-graph.json>`
//! Example: run_flow --input '{"Items": [1, 2, 3]}' tests/integration/loop.json
//!
//! Set RUST_LOG=streamweave_flow=trace for TRACE-level span enter/exit and events.

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use streamweave_flow::config::ENV_POLL_INTERVAL_MS;
use streamweave_flow::{FlowConfig, GraphRunner, Payload, load_graph};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run an agent graph from a JSON file.
#[derive(Parser, Debug)]
#[command(name = "run_flow")]
#[command(
  after_help = r#"Environment variables (override the matching flag when set):
  FLOW_POLL_INTERVAL_MS        Fallback tick of join polling (default 1000).
  FLOW_DEFAULT_JOBS_COUNT      Join threshold when a component sets none (default 1).
  FLOW_DEFAULT_MAX_TIME_SECS   Join budget when a component sets none (default 1).
  FLOW_MAX_LOOP_ITERATIONS     Iteration cap per loop (default 10000).

Examples:
  run_flow tests/integration/fork_join.json
  run_flow --input '{"Items": "a,b,c"}' tests/integration/loop.json"#
)]
struct Args {
  /// Input object fed to the entry component, as JSON.
  #[arg(long, value_name = "JSON", default_value = "{}")]
  input: String,

  /// Agent id the run is registered under.
  #[arg(long, value_name = "ID", default_value = "cli-agent")]
  agent_id: String,

  /// Fallback tick of join polling. Overridden by FLOW_POLL_INTERVAL_MS if set.
  #[arg(long, value_name = "MS")]
  poll_interval_ms: Option<u64>,

  /// Seconds to wait for background jobs still pending after the run.
  #[arg(long, value_name = "SECS", default_value_t = 0)]
  drain_secs: u64,

  /// Path to the graph JSON file
  #[arg(value_name = "path-to-graph")]
  graph_path: PathBuf,
}

fn parse_input(raw: &str) -> Result<Payload, String> {
  match serde_json::from_str::<Value>(raw) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(other) => Err(format!("input must be a JSON object, got {other}")),
    Err(e) => Err(format!("input is not valid JSON: {e}")),
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  // Env vars override flags.
  let mut config = FlowConfig::from_env();
  if let Some(ms) = args
    .poll_interval_ms
    .filter(|_| env::var(ENV_POLL_INTERVAL_MS).is_err())
  {
    config.poll_interval_ms = ms;
  }
  info!(config = ?config, agent_id = %args.agent_id, "run_flow starting");

  let input = match parse_input(&args.input) {
    Ok(p) => p,
    Err(e) => {
      eprintln!("Error: {e}");
      process::exit(2);
    }
  };

  let graph = match load_graph(&args.graph_path) {
    Ok(g) => g,
    Err(e) => {
      eprintln!("Error loading {}: {}", args.graph_path.display(), e);
      process::exit(1);
    }
  };

  let runner = GraphRunner::with_builtins();
  let agent = runner.context(args.agent_id.clone(), graph).with_config(config);
  let output = match runner.run(&agent, input).await {
    Ok(out) => out,
    Err(e) => {
      eprintln!("Run error: {e}");
      process::exit(1);
    }
  };

  if args.drain_secs > 0 {
    let idle = agent
      .jobs()
      .wait_idle(&agent.id, Duration::from_secs(args.drain_secs))
      .await;
    if !idle {
      warn!(pending = agent.jobs().pending_for_agent(&agent.id), "background jobs still pending");
    }
  }

  match serde_json::to_string_pretty(&Value::Object(output)) {
    Ok(json) => println!("{json}"),
    Err(e) => {
      eprintln!("Error encoding output: {e}");
      process::exit(1);
    }
  }
}
