//! Equivalence checking between netlists.
//!
//! This crate ties the pipeline together: netlist text is built into a
//! graph, dummy cells are collapsed, and the two graphs are compared either
//! exactly (canonical hash) or approximately (graph matching). It also
//! scopes comparisons to one block of a design hierarchy.

pub mod driver;
pub mod hierarchy;

pub use driver::{
    CheckReport, DriverError, GraphStats, PreparedGraph, check_equivalence, check_files,
    compare_batch, compare_prepared, prepare_graph, read_netlist,
};
pub use hierarchy::{
    HierarchyEntry, HierarchyReport, ResolvedBlock, compare_hierarchies, compare_hierarchies_text,
    compare_hierarchy, compare_hierarchy_text, resolve_path,
};
