//! Graph model and graph-level algorithms for netlist equivalence.
//!
//! * [`graph`]: the ordered node/edge container every stage works on.
//! * [`collapse`]: removal of pass-through dummy cells.
//! * [`hash`]: canonical Weisfeiler-Lehman hashing.
//! * [`matching`]: approximate node correspondence with a structural score.

pub mod collapse;
pub mod graph;
pub mod graph_index;
pub mod hash;
pub mod matching;
pub mod profiling;

pub use collapse::{Collapsed, collapse, collapse_dummies};
pub use graph::{Dialect, Edge, EdgeAttrs, Graph, GraphError, NET_TYPE, Node, NodeCategory, PIN_TYPE};
pub use graph_index::GraphIndex;
pub use hash::{EquivalenceReport, canonical_hash, compare_hashes};
pub use matching::{MatchError, MatchResult, MatchedPair, match_graphs};
pub use profiling::{StageSample, Timer, log_profile, reset_profile, stage_profile};
