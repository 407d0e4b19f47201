//! Approximate graph matching.
//!
//! Finds a node correspondence between two graphs that preserves as many
//! edges as possible while only pairing nodes of the same type. The soft
//! correspondence comes from a reweighted random walk over a factored pairwise
//! affinity; a Hungarian assignment then turns it into one-to-one pairs.
//!
//! Dense `n1 × n2` matrices are used throughout, so very large graphs are
//! refused up front (see [`MatchConfig::max_pairs`]).

#[cfg(feature = "matching")]
mod affinity;
#[cfg(feature = "matching")]
mod assignment;
#[cfg(feature = "matching")]
mod rrwm;

use neq_common::MatchConfig;
use serde::Serialize;
use thiserror::Error;

use crate::graph::Graph;

/// Reasons the matcher can refuse or abandon a comparison.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// The crate was built without its numeric backend.
    #[error("Graph matching is unavailable: built without the '{feature}' feature")]
    DependencyUnavailable {
        /// Cargo feature that enables matching.
        feature: &'static str,
    },

    /// The candidate pair count exceeds the configured limit.
    #[error("Graph matching refused: {pairs} candidate pairs exceeds the limit of {limit}")]
    SizeLimitExceeded {
        /// `n1 * n2`.
        pairs: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The relaxation ran past the configured deadline.
    #[error("Graph matching timed out after {iterations} iterations")]
    TimedOut {
        /// Iterations completed before the deadline.
        iterations: usize,
    },
}

/// One pair of the hard assignment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchedPair {
    /// Node id in the first graph.
    pub node_a: String,
    /// Node id in the second graph.
    pub node_b: String,
    /// Soft correspondence value for the pair, in `[0, 1]`.
    pub confidence: f64,
}

/// Outcome of [`match_graphs`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    /// One-to-one pairs, ordered by position in the first graph.
    pub matched_pairs: Vec<MatchedPair>,
    /// Number of first-graph edges carried onto second-graph edges.
    pub score: f64,
    /// `score` divided by the larger edge count; zero when both are edgeless.
    pub normalized_score: f64,
    /// `(n1, n2)`.
    pub matrix_shape: (usize, usize),
    /// Relaxation iterations run.
    pub iterations: usize,
    /// Whether the relaxation met its tolerance.
    pub converged: bool,
}

impl MatchResult {
    #[cfg_attr(not(feature = "matching"), allow(dead_code))]
    fn empty(matrix_shape: (usize, usize)) -> Self {
        Self {
            matched_pairs: Vec::new(),
            score: 0.0,
            normalized_score: 0.0,
            matrix_shape,
            iterations: 0,
            converged: true,
        }
    }

    /// Returns true if `normalized_score` reaches `threshold`.
    #[must_use]
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.normalized_score >= threshold
    }

    /// Second-graph partner of `node_a`, if it was matched.
    #[must_use]
    pub fn partner_of(&self, node_a: &str) -> Option<&str> {
        self.matched_pairs
            .iter()
            .find(|pair| pair.node_a == node_a)
            .map(|pair| pair.node_b.as_str())
    }
}

/// Matches the nodes of `a` against the nodes of `b`.
///
/// An empty graph on either side yields an empty result with score zero.
pub fn match_graphs(a: &Graph, b: &Graph, config: &MatchConfig) -> Result<MatchResult, MatchError> {
    #[cfg(feature = "matching")]
    {
        solver::solve(a, b, config)
    }

    #[cfg(not(feature = "matching"))]
    {
        let _ = (a, b, config);
        Err(MatchError::DependencyUnavailable {
            feature: "matching",
        })
    }
}

#[cfg(feature = "matching")]
mod solver {
    use std::time::Instant;

    use nalgebra::DMatrix;
    use neq_common::MatchConfig;
    use tracing::{debug, info, warn};

    use super::affinity::Affinity;
    use super::assignment::max_weight_assignment;
    use super::rrwm::{rrwm, sinkhorn};
    use super::{MatchError, MatchResult, MatchedPair};
    use crate::Timer;
    use crate::graph::Graph;
    use crate::graph_index::GraphIndex;

    pub(super) fn solve(
        a: &Graph,
        b: &Graph,
        config: &MatchConfig,
    ) -> Result<MatchResult, MatchError> {
        let _t = Timer::new("match_graphs");

        let shape = (a.node_count(), b.node_count());
        let (n1, n2) = shape;
        if n1 == 0 || n2 == 0 {
            debug!("Matching against an empty graph ({} x {})", n1, n2);
            return Ok(MatchResult::empty(shape));
        }

        let pairs = n1.saturating_mul(n2);
        if let Some(limit) = config.max_pairs.filter(|&limit| pairs > limit) {
            warn!("Refusing to match {} x {} graphs ({} pairs)", n1, n2, pairs);
            return Err(MatchError::SizeLimitExceeded { pairs, limit });
        }
        let deadline = config.timeout().map(|timeout| Instant::now() + timeout);

        let index_a = GraphIndex::build(a);
        let index_b = GraphIndex::build(b);
        let affinity = Affinity::build(&index_a, &index_b);

        let relaxation = rrwm(&affinity, shape, config, deadline)?;
        let masked = relaxation.soft.component_mul(affinity.compatibility());
        let soft = sinkhorn(masked, config.sinkhorn_iterations);

        let assignment = max_weight_assignment(&soft);

        let mut permutation = DMatrix::<f64>::zeros(n1, n2);
        for &(i, j) in &assignment {
            permutation[(i, j)] = 1.0;
        }
        let projected = permutation.transpose() * affinity.adjacency_a() * &permutation;
        let score = projected.component_mul(affinity.adjacency_b()).sum();

        let max_edges = index_a.edge_count().max(index_b.edge_count());
        let normalized_score = if max_edges == 0 {
            0.0
        } else {
            score / max_edges as f64
        };

        let matched_pairs = assignment
            .into_iter()
            .map(|(i, j)| MatchedPair {
                node_a: index_a.nodes()[i].id.clone(),
                node_b: index_b.nodes()[j].id.clone(),
                confidence: soft[(i, j)],
            })
            .collect();

        info!(
            "Matched {} x {} graphs: score {} ({:.3}) after {} iterations{}",
            n1,
            n2,
            score,
            normalized_score,
            relaxation.iterations,
            if relaxation.converged { "" } else { " (not converged)" }
        );

        Ok(MatchResult {
            matched_pairs,
            score,
            normalized_score,
            matrix_shape: shape,
            iterations: relaxation.iterations,
            converged: relaxation.converged,
        })
    }
}
