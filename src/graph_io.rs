//! Agent graph save/load (JSON) and structural validation.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::instrument;

use crate::error::{FlowError, Result};
use crate::types::AgentGraph;

/// Checks that the graph can be scheduled: the entry exists and is not part of a
/// background branch, and every connection joins two known components.
#[instrument(level = "trace", skip(graph), fields(entry = %graph.entry))]
pub fn validate(graph: &AgentGraph) -> Result<()> {
  let entry = graph
    .component(&graph.entry)
    .ok_or_else(|| FlowError::InvalidGraph(format!("entry '{}' is not a component", graph.entry)))?;
  if entry.async_branch {
    return Err(FlowError::InvalidGraph(format!(
      "entry '{}' cannot be async",
      graph.entry
    )));
  }
  for c in &graph.connections {
    for end in [&c.source_id, &c.target_id] {
      if !graph.contains(end) {
        return Err(FlowError::InvalidGraph(format!(
          "connection {}.{} -> {}.{} references unknown component '{end}'",
          c.source_id, c.source_output, c.target_id, c.target_input
        )));
      }
    }
  }
  Ok(())
}

fn check_unique_ids(raw: &Value) -> Result<()> {
  let Some(components) = raw.get("components").and_then(Value::as_array) else {
    return Ok(());
  };
  let mut seen = HashSet::new();
  for id in components.iter().filter_map(|c| c.get("id").and_then(Value::as_str)) {
    if !seen.insert(id) {
      return Err(FlowError::InvalidGraph(format!("duplicate component id '{id}'")));
    }
  }
  Ok(())
}

/// Loads and validates a graph from `path`.
#[instrument(level = "trace", skip(path))]
pub fn load_graph(path: &Path) -> Result<AgentGraph> {
  let bytes = std::fs::read(path)?;
  let raw: Value = serde_json::from_slice(&bytes)?;
  check_unique_ids(&raw)?;
  let graph: AgentGraph = serde_json::from_value(raw)?;
  validate(&graph)?;
  Ok(graph)
}

/// Saves a graph to `path` as pretty JSON, creating parent directories.
#[instrument(level = "trace", skip(path, graph))]
pub fn save_graph(path: &Path, graph: &AgentGraph) -> Result<()> {
  let json = serde_json::to_string_pretty(graph)?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)?;
  Ok(())
}
