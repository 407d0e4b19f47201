use std::fs;
use std::path::{Path, PathBuf};

use contracts::ensures;
use neq_common::{CheckConfig, CheckMode};
use neq_graph::{
    EquivalenceReport, Graph, MatchError, MatchResult, collapse, compare_hashes, match_graphs,
};
use neq_netlist::{SubcircuitError, build_graph_with_report};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Inconsistent input: {0}")]
    SchemaInconsistency(String),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Subcircuit(#[from] SubcircuitError),
}

impl DriverError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaInconsistency(msg.into())
    }
}

/// Size of a graph before and after dummy collapsing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub removed_dummies: usize,
    pub merged_nets: usize,
    pub skipped_statements: usize,
}

/// A parsed and (optionally) collapsed netlist.
#[derive(Clone, Debug)]
pub struct PreparedGraph {
    pub graph: Graph,
    pub stats: GraphStats,
}

/// Result of comparing two netlists.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckReport {
    pub mode: CheckMode,
    pub graph_a: GraphStats,
    pub graph_b: GraphStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<EquivalenceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching: Option<MatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// `None` in match mode without a threshold: the score is reported but
    /// no verdict is drawn from it.
    pub equivalent: Option<bool>,
}

impl CheckReport {
    /// Returns false only for a definite "not equivalent" verdict.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.equivalent.unwrap_or(true)
    }
}

/// Reads a netlist file in one go.
pub fn read_netlist<P: AsRef<Path>>(path: P) -> Result<String, DriverError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| DriverError::io(path, e))?;
    debug!("Read {} bytes from {}", text.len(), path.display());
    Ok(text)
}

/// Builds the graph for `text` and collapses dummies if configured.
#[must_use]
pub fn prepare_graph(text: &str, config: &CheckConfig) -> PreparedGraph {
    let report = build_graph_with_report(text, &config.parse);
    let skipped_statements = report.skipped.len();

    let (graph, removed_dummies, merged_nets) = if config.clean_dummies {
        let collapsed = collapse(&report.graph, &config.collapse);
        let removed = collapsed.removed_count();
        let merged = collapsed.merged_nets.len();
        (collapsed.graph, removed, merged)
    } else {
        (report.graph, 0, 0)
    };

    PreparedGraph {
        stats: GraphStats {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            removed_dummies,
            merged_nets,
            skipped_statements,
        },
        graph,
    }
}

/// Compares two netlist texts according to `config`.
///
/// Parsing never fails; only the matcher can return an error.
pub fn check_equivalence(
    text_a: &str,
    text_b: &str,
    config: &CheckConfig,
) -> Result<CheckReport, DriverError> {
    let a = prepare_graph(text_a, config);
    let b = prepare_graph(text_b, config);
    compare_prepared(&a, &b, config)
}

/// Compares two already prepared graphs.
pub fn compare_prepared(
    a: &PreparedGraph,
    b: &PreparedGraph,
    config: &CheckConfig,
) -> Result<CheckReport, DriverError> {
    let mut report = CheckReport {
        mode: config.mode,
        graph_a: a.stats.clone(),
        graph_b: b.stats.clone(),
        hash: None,
        matching: None,
        threshold: config.threshold,
        equivalent: None,
    };

    match config.mode {
        CheckMode::Hash => {
            let hashes = compare_hashes(&a.graph, &b.graph, &config.hash);
            report.equivalent = Some(hashes.equivalent);
            report.hash = Some(hashes);
        }
        CheckMode::Match => {
            let result = match_graphs(&a.graph, &b.graph, &config.matching)?;
            report.equivalent = config
                .threshold
                .map(|threshold| result.meets_threshold(threshold));
            report.matching = Some(result);
        }
    }

    info!(
        "{:?} check: {}",
        config.mode,
        match report.equivalent {
            Some(true) => "equivalent",
            Some(false) => "not equivalent",
            None => "no verdict",
        }
    );
    Ok(report)
}

/// Reads both files and compares them.
pub fn check_files<P: AsRef<Path>, Q: AsRef<Path>>(
    path_a: P,
    path_b: Q,
    config: &CheckConfig,
) -> Result<CheckReport, DriverError> {
    let text_a = read_netlist(path_a)?;
    let text_b = read_netlist(path_b)?;
    check_equivalence(&text_a, &text_b, config)
}

/// Compares every `(a, b)` text pair independently.
///
/// One failing pair does not stop the others. An empty batch is rejected.
#[ensures(ret.as_ref().map_or(true, |results| results.len() == pairs.len()))]
pub fn compare_batch(
    pairs: &[(String, String)],
    config: &CheckConfig,
) -> Result<Vec<Result<CheckReport, DriverError>>, DriverError> {
    if pairs.is_empty() {
        return Err(DriverError::schema("batch contains no netlist pairs"));
    }

    #[cfg(feature = "parallel")]
    let pair_iter = pairs.par_iter();

    #[cfg(not(feature = "parallel"))]
    let pair_iter = pairs.iter();

    let results: Vec<Result<CheckReport, DriverError>> = pair_iter
        .map(|(a, b)| check_equivalence(a, b, config))
        .collect();

    debug!(
        "Batch of {} comparisons, {} failed",
        results.len(),
        results.iter().filter(|r| r.is_err()).count()
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_check_reports_counts() {
        let report = check_equivalence(
            "INV u1(A(a),ZN(b));",
            "INV v1(A(x),ZN(y));",
            &CheckConfig::new(CheckMode::Hash).with_clean_dummies(false),
        )
        .unwrap();
        assert_eq!(report.equivalent, Some(true));
        assert_eq!(report.graph_a.node_count, 2);
        assert!(report.matching.is_none());
    }

    #[test]
    fn test_match_without_threshold_has_no_verdict() {
        let report = check_equivalence(
            "AND u1(A(a),Y(b)); OR u2(A(b),Y(c));",
            "AND u1(A(a),Y(b)); OR u2(A(b),Y(c));",
            &CheckConfig::new(CheckMode::Match),
        )
        .unwrap();
        assert_eq!(report.equivalent, None);
        assert!(report.passed());
        assert_eq!(report.matching.unwrap().normalized_score, 1.0);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_netlist(dir.path().join("nope.v")).unwrap_err();
        assert!(matches!(err, DriverError::Io { .. }));
    }
}
