//! Stores shared by the controllers of one runtime.
//!
//! These are owned by whoever drives the graph and handed to every invocation through
//! [crate::AgentContext]; nothing here is a process-wide static.

mod job_registry;
mod runtime_data;
#[cfg(test)]
mod runtime_data_test;
mod wait_set;

pub use job_registry::JobRegistry;
pub use runtime_data::{InMemoryRuntimeData, RuntimeDataStore};
pub use wait_set::{WaitKey, WaitSet};
