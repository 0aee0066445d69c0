//! # streamweave-flow
//!
//! Fork/join and iteration control for agent workflow graphs.
//!
//! ## Architecture
//!
//! An agent is a graph of components connected port to port. Control flow is carried by
//! three components (see `nodes` module):
//!
//! - `Async` forks a background sub-execution of a pruned copy of the graph and returns
//!   a job handle at once.
//! - `Await` joins a set of jobs until a completion threshold or a time budget.
//! - `ForEach` hands out one element per invocation and accumulates the loop body's
//!   results.
//!
//! Jobs and pending joins live in the `registry` module; `graph_pruner` cuts forked copies
//! down to their background branch. [GraphRunner] is a reference scheduler that drives all
//! of it.

pub mod agent;
pub mod config;
pub mod error;
pub mod graph_io;
pub mod graph_pruner;
pub mod nodes;
pub mod registry;
pub mod runner;
pub mod types;

pub use agent::{AgentContext, BranchObserver, ForkedExecution, TracingObserver};
pub use config::FlowConfig;
pub use error::{FlowError, Result};
pub use graph_io::{load_graph, save_graph, validate};
pub use graph_pruner::{remove_component, remove_orphaned_branches};
pub use nodes::{AsyncNode, AwaitNode, Component, ComponentRegistry, ForEachNode};
pub use registry::{JobRegistry, WaitSet};
pub use runner::GraphRunner;
pub use types::{AgentGraph, ComponentInstance, Connection, Job, JobStatus, Payload};
