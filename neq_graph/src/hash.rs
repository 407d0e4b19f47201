//! Canonical structural hashing by Weisfeiler-Lehman label refinement.
//!
//! Every node starts from a label derived from its type only; each round
//! replaces it with a digest of the previous label and the sorted multisets of
//! predecessor and successor labels. The graph digest covers the sorted final
//! labels plus node and edge counts. Node ids never enter a digest, so renaming
//! nodes leaves the hash unchanged.
//!
//! Equal hashes are necessary but not sufficient for isomorphism: WL
//! refinement cannot tell apart some regular graphs.

use std::fmt::Write as _;

use itertools::Itertools;
use neq_common::{HashConfig, NodeIdx};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::Timer;
use crate::graph::Graph;
use crate::graph_index::GraphIndex;

const INIT_DOMAIN: &[u8] = b"INIT";
const ROUND_DOMAIN: &[u8] = b"ROUND";
const GRAPH_DOMAIN: &[u8] = b"GRAPH";

/// 256-bit refinement label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label([u8; 32]);

impl Label {
    /// SHA-256 of `data` under `NEQ:<domain>:v1` with a little-endian length prefix.
    fn digest(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"NEQ:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Lowercase hex rendering, 64 characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

/// Side-by-side hash comparison of two graphs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EquivalenceReport {
    /// Hash of the first graph.
    pub hash_a: String,
    /// Hash of the second graph.
    pub hash_b: String,
    /// Whether the hashes and the node and edge counts agree.
    pub equivalent: bool,
    /// Node count of the first graph.
    pub node_count_a: usize,
    /// Node count of the second graph.
    pub node_count_b: usize,
    /// Edge count of the first graph.
    pub edge_count_a: usize,
    /// Edge count of the second graph.
    pub edge_count_b: usize,
}

/// Hex SHA-256 canonical hash of `graph` after `rounds` refinement rounds.
#[must_use]
pub fn canonical_hash(graph: &Graph, rounds: usize) -> String {
    let _t = Timer::new("canonical_hash");

    let index = GraphIndex::build(graph);
    let mut labels = refine(&index, rounds);
    labels.sort_unstable();

    let mut data = Vec::with_capacity(labels.len() * 32 + 16);
    for label in &labels {
        data.extend_from_slice(&label.0);
    }
    data.extend_from_slice(&(index.len() as u64).to_le_bytes());
    data.extend_from_slice(&(index.edge_count() as u64).to_le_bytes());

    let hash = Label::digest(GRAPH_DOMAIN, &data).to_hex();
    debug!(
        "Hashed graph with {} nodes / {} edges over {} rounds: {}",
        index.len(),
        index.edge_count(),
        rounds,
        hash
    );
    hash
}

/// Per-node labels after `rounds` refinement rounds, in node order.
#[must_use]
pub fn node_labels(graph: &Graph, rounds: usize) -> Vec<Label> {
    refine(&GraphIndex::build(graph), rounds)
}

/// Hashes both graphs and reports whether they agree.
#[must_use]
pub fn compare_hashes(a: &Graph, b: &Graph, config: &HashConfig) -> EquivalenceReport {
    let hash_a = canonical_hash(a, config.rounds);
    let hash_b = canonical_hash(b, config.rounds);
    let same_size = a.node_count() == b.node_count() && a.edge_count() == b.edge_count();
    EquivalenceReport {
        equivalent: same_size && hash_a == hash_b,
        hash_a,
        hash_b,
        node_count_a: a.node_count(),
        node_count_b: b.node_count(),
        edge_count_a: a.edge_count(),
        edge_count_b: b.edge_count(),
    }
}

fn refine(index: &GraphIndex<'_>, rounds: usize) -> Vec<Label> {
    let mut labels: Vec<Label> = index
        .nodes()
        .iter()
        .map(|node| Label::digest(INIT_DOMAIN, node.type_label.as_bytes()))
        .collect();

    for round in 0..rounds {
        labels = NodeIdx::range(index.len())
            .map(|idx| {
                let mut data = Vec::new();
                data.extend_from_slice(&(round as u64).to_le_bytes());
                data.extend_from_slice(&labels[idx.as_usize()].0);
                push_multiset(&mut data, index.fanin(idx), &labels);
                data.push(b'|');
                push_multiset(&mut data, index.fanout(idx), &labels);
                Label::digest(ROUND_DOMAIN, &data)
            })
            .collect();
    }
    labels
}

fn push_multiset(data: &mut Vec<u8>, neighbours: &[NodeIdx], labels: &[Label]) {
    let multiset = neighbours
        .iter()
        .map(|n| labels[n.as_usize()])
        .sorted_unstable()
        .collect_vec();
    data.extend_from_slice(&(multiset.len() as u64).to_le_bytes());
    for label in multiset {
        data.extend_from_slice(&label.0);
    }
}
