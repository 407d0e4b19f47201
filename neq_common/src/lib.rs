//! Common configuration values and shared types for the NEQ workspace.
//!
//! Every stage of the netlist equivalence pipeline (parsing, collapsing,
//! hashing, matching, subcircuit indexing) takes its settings as an explicit
//! value from this crate. Nothing is cached between calls.

mod config;
mod node_idx;

pub use crate::config::*;
pub use crate::node_idx::NodeIdx;
