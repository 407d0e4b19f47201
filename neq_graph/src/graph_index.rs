use std::collections::HashMap;

use neq_common::NodeIdx;

use crate::Timer;
use crate::graph::{Graph, Node};

/// Dense, position-addressed view of a [`Graph`].
///
/// Built once per stage so fan-in and fan-out lookups do not rescan the edge
/// list.
#[derive(Clone, Debug)]
pub struct GraphIndex<'a> {
    /// Nodes in the graph's ordering snapshot
    nodes: Vec<&'a Node>,
    type_map: HashMap<&'a str, Vec<NodeIdx>>,

    fanin: Vec<Vec<NodeIdx>>,
    fanout: Vec<Vec<NodeIdx>>,
    edge_count: usize,
}

impl<'a> GraphIndex<'a> {
    /// Indexes `graph`.
    pub fn build(graph: &'a Graph) -> Self {
        let _t = Timer::new("GraphIndex::build");

        // 0: Node ordering snapshot
        let nodes: Vec<&'a Node> = graph.nodes().collect();

        // 1: Type buckets
        let type_map = Self::build_type_map(&nodes);

        // 2: Adjacency in both directions
        let (fanin, fanout, edge_count) = Self::build_adjacency(graph, nodes.len());

        GraphIndex {
            nodes,
            type_map,
            fanin,
            fanout,
            edge_count,
        }
    }

    fn build_type_map(nodes: &[&'a Node]) -> HashMap<&'a str, Vec<NodeIdx>> {
        let mut type_map: HashMap<&'a str, Vec<NodeIdx>> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            type_map
                .entry(node.type_label.as_str())
                .or_default()
                .push(NodeIdx::from(i));
        }
        type_map
    }

    fn build_adjacency(graph: &Graph, len: usize) -> (Vec<Vec<NodeIdx>>, Vec<Vec<NodeIdx>>, usize) {
        let mut fanin: Vec<Vec<NodeIdx>> = vec![Vec::new(); len];
        let mut fanout: Vec<Vec<NodeIdx>> = vec![Vec::new(); len];
        let mut edge_count = 0;
        for edge in graph.edges() {
            let (Some(from), Some(to)) = (graph.node_index(edge.from), graph.node_index(edge.to))
            else {
                continue;
            };
            fanout[from.as_usize()].push(to);
            fanin[to.as_usize()].push(from);
            edge_count += 1;
        }
        (fanin, fanout, edge_count)
    }

    /// Node at `idx`.
    #[must_use]
    pub fn node(&self, idx: NodeIdx) -> &'a Node {
        self.nodes[idx.as_usize()]
    }

    /// All nodes in snapshot order.
    #[must_use]
    pub fn nodes(&self) -> &[&'a Node] {
        &self.nodes
    }

    /// Distinct predecessors of `idx`.
    #[must_use]
    pub fn fanin(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.fanin[idx.as_usize()]
    }

    /// Distinct successors of `idx`.
    #[must_use]
    pub fn fanout(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.fanout[idx.as_usize()]
    }

    /// Nodes whose type label is `type_label`.
    #[must_use]
    pub fn get_by_type(&self, type_label: &str) -> &[NodeIdx] {
        self.type_map
            .get(type_label)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Distinct type labels present, in no particular order.
    pub fn types(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.type_map.keys().copied()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the indexed graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of directed edges.
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }
}
