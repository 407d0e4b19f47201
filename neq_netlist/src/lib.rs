//! Netlist text handling: graph construction for both supported dialects
//! and subcircuit block extraction from larger files.

pub mod builder;
pub mod subckt;

pub use builder::{
    BuildReport, FormatError, build_graph, build_graph_with_report, parse_connectivity,
    parse_instance_port,
};
pub use neq_graph::Dialect;
pub use subckt::{BlockSpan, SubcircuitError, SubcircuitIndex, find_model_of_instance};
