//! Structural pruning of an agent graph after a background branch is carved out.
//!
//! Orphan status is purely structural (no inbound connection, not the entry), so the
//! fixed point reached does not depend on the order siblings are deleted in.

use tracing::{debug, instrument};

use crate::types::AgentGraph;

/// Deletes every non-entry component with zero inbound connections, cascading until no
/// orphan is left. Returns the ids removed.
#[instrument(level = "trace", skip(graph))]
pub fn remove_orphaned_branches(graph: &mut AgentGraph) -> Vec<String> {
  let mut removed = Vec::new();
  loop {
    let orphans: Vec<String> = graph
      .components
      .keys()
      .filter(|id| **id != graph.entry && graph.inbound_count(id) == 0)
      .cloned()
      .collect();
    if orphans.is_empty() {
      break;
    }
    for id in orphans {
      removed.extend(remove_component(graph, &id));
    }
  }
  removed
}

/// Deletes a component and its connections, then cascades through
/// [remove_orphaned_branches]. The entry component is never deleted.
#[instrument(level = "trace", skip(graph))]
pub fn remove_component(graph: &mut AgentGraph, id: &str) -> Vec<String> {
  if id == graph.entry || graph.components.remove(id).is_none() {
    return Vec::new();
  }
  graph
    .connections
    .retain(|c| c.source_id != id && c.target_id != id);
  debug!(component_id = %id, "component pruned");
  let mut removed = vec![id.to_string()];
  removed.extend(remove_orphaned_branches(graph));
  removed
}

/// Cuts the edges leaving `fork_id`'s `job_port` that target components not flagged
/// `async`, then removes whatever that leaves unreachable. Returns the ids removed.
#[instrument(level = "trace", skip(graph))]
pub fn prune_job_branch(graph: &mut AgentGraph, fork_id: &str, job_port: &str) -> Vec<String> {
  let before = graph.connections.len();
  let components = &graph.components;
  graph.connections.retain(|c| {
    let is_job_edge = c.source_id == fork_id && c.source_output == job_port;
    let keeps_async_target = components
      .get(&c.target_id)
      .is_some_and(|t| t.async_branch);
    !is_job_edge || keeps_async_target
  });
  debug!(
    fork_id = %fork_id,
    cut = before - graph.connections.len(),
    "job handle edges cut"
  );
  remove_orphaned_branches(graph)
}
