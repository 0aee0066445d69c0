//! Data model of agent graphs, jobs and loop state.
//!
//! Component inputs and outputs are JSON objects ([Payload]) keyed by port name.

mod agent_graph;
mod component_instance;
mod connection;
mod job;
mod loop_state;

pub use agent_graph::AgentGraph;
pub use component_instance::{ComponentInstance, FORKED_KEY, PortDef};
pub use connection::Connection;
pub use job::{Job, JobStatus};
pub use loop_state::{LoopState, ResultFormat};

/// Port-name keyed values flowing into and out of a component.
pub type Payload = serde_json::Map<String, serde_json::Value>;
