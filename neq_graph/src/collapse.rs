//! Removal of pass-through cells.
//!
//! A dummy cell (buffer, inverter, delay) that sits on a single path carries
//! no structure of its own. Collapsing splices it out so that two netlists
//! differing only by inserted buffers produce the same graph.
//!
//! Two shapes qualify:
//!
//! * directed: exactly one distinct predecessor and one distinct successor.
//!   The dummy is replaced by a direct edge, or, when both neighbours are
//!   nets, the two nets are merged.
//! * bipartite: every edge is a symmetric pair with a net node and the cell
//!   touches exactly two distinct nets. The two nets are merged.
//!
//! Merged nets keep the id of whichever was inserted first. Collapsing repeats
//! until no candidate is left, so the result is a fixpoint.

use indexmap::{IndexMap, IndexSet};
use neq_common::CollapseConfig;
use tracing::{debug, info};

use crate::Timer;
use crate::graph::{EdgeAttrs, Graph, Node};

/// Output of [`collapse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collapsed {
    /// The collapsed graph.
    pub graph: Graph,
    /// Ids of removed dummy cells, in removal order.
    pub removed: Vec<String>,
    /// `(absorbed, representative)` for every net merged away.
    pub merged_nets: Vec<(String, String)>,
}

impl Collapsed {
    /// Number of dummy cells removed.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Collapses the default dummy types (`BUF`, `INV`, `DUMMY`).
#[must_use]
pub fn collapse_dummies(graph: &Graph) -> Graph {
    collapse(graph, &CollapseConfig::default()).graph
}

/// Collapses every qualifying dummy cell of `graph`.
#[must_use]
pub fn collapse(graph: &Graph, config: &CollapseConfig) -> Collapsed {
    let _t = Timer::new("collapse");

    let mut state = CollapseState::new(graph);
    let mut removed = Vec::new();

    loop {
        let mut changed = false;
        for d in 0..state.nodes.len() {
            if !state.alive[d] {
                continue;
            }
            let node = state.nodes[d];
            if !node.is_instance() || !config.is_dummy(&node.type_label) {
                continue;
            }
            let Some(action) = state.plan(d) else {
                continue;
            };
            debug!("Collapsing dummy {} ({})", node.id, node.type_label);
            state.apply(d, action);
            removed.push(node.id.clone());
            changed = true;
        }
        if !changed {
            break;
        }
    }

    let merged_nets = state.merged_nets();
    let graph = state.finish(graph);

    info!(
        "Collapsed {} dummy cells, merged {} nets",
        removed.len(),
        merged_nets.len()
    );

    Collapsed {
        graph,
        removed,
        merged_nets,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Splice { pred: usize, succ: usize },
    MergeNets(usize, usize),
}

/// Disjoint sets over node positions; the root is the lowest position.
#[derive(Debug)]
struct NetUnion {
    parent: Vec<usize>,
}

impl NetUnion {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    /// Returns `(root, absorbed)`.
    fn union(&mut self, a: usize, b: usize) -> (usize, usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        let (root, absorbed) = if ra <= rb { (ra, rb) } else { (rb, ra) };
        self.parent[absorbed] = root;
        (root, absorbed)
    }
}

struct CollapseState<'g> {
    nodes: Vec<&'g Node>,
    alive: Vec<bool>,
    edges: IndexMap<(usize, usize), EdgeAttrs>,
    preds: Vec<IndexSet<usize>>,
    succs: Vec<IndexSet<usize>>,
    nets: NetUnion,
    absorbed: Vec<usize>,
}

impl<'g> CollapseState<'g> {
    fn new(graph: &'g Graph) -> Self {
        let nodes: Vec<&'g Node> = graph.nodes().collect();
        let len = nodes.len();
        let mut state = Self {
            nodes,
            alive: vec![true; len],
            edges: IndexMap::new(),
            preds: vec![IndexSet::new(); len],
            succs: vec![IndexSet::new(); len],
            nets: NetUnion::new(len),
            absorbed: Vec::new(),
        };
        for edge in graph.edges() {
            let (Some(from), Some(to)) = (graph.node_index(edge.from), graph.node_index(edge.to))
            else {
                continue;
            };
            state.insert_edge(from.as_usize(), to.as_usize(), edge.attrs.clone());
        }
        state
    }

    fn is_net(&self, i: usize) -> bool {
        self.nodes[i].is_net()
    }

    fn insert_edge(&mut self, from: usize, to: usize, attrs: EdgeAttrs) {
        self.edges.insert((from, to), attrs);
        self.succs[from].insert(to);
        self.preds[to].insert(from);
    }

    fn insert_edge_if_absent(&mut self, from: usize, to: usize, attrs: EdgeAttrs) {
        if !self.edges.contains_key(&(from, to)) {
            self.insert_edge(from, to, attrs);
        }
    }

    fn remove_edge(&mut self, from: usize, to: usize) -> Option<EdgeAttrs> {
        let attrs = self.edges.shift_remove(&(from, to))?;
        self.succs[from].shift_remove(&to);
        self.preds[to].shift_remove(&from);
        Some(attrs)
    }

    fn plan(&self, d: usize) -> Option<Action> {
        let preds = &self.preds[d];
        let succs = &self.succs[d];
        if preds.contains(&d) || succs.contains(&d) {
            return None;
        }

        if preds.len() == 1 && succs.len() == 1 {
            let (pred, succ) = (preds[0], succs[0]);
            if self.is_net(pred) && self.is_net(succ) {
                return Some(Action::MergeNets(pred, succ));
            }
            return Some(Action::Splice { pred, succ });
        }

        let symmetric = preds.len() == succs.len() && preds.iter().all(|p| succs.contains(p));
        if symmetric && preds.len() == 2 && preds.iter().all(|&p| self.is_net(p)) {
            return Some(Action::MergeNets(preds[0], preds[1]));
        }

        None
    }

    fn apply(&mut self, d: usize, action: Action) {
        let outgoing = match action {
            Action::Splice { succ, .. } => self.edges.get(&(d, succ)).cloned(),
            Action::MergeNets(..) => None,
        };
        self.remove_node(d);

        match action {
            Action::Splice { pred, succ } => {
                let net_name = outgoing.and_then(|attrs| attrs.net_name);
                self.insert_edge_if_absent(pred, succ, EdgeAttrs::spliced(net_name));
            }
            Action::MergeNets(a, b) if a != b => self.merge_nets(a, b),
            Action::MergeNets(..) => {}
        }
    }

    fn remove_node(&mut self, d: usize) {
        let preds: Vec<usize> = self.preds[d].iter().copied().collect();
        let succs: Vec<usize> = self.succs[d].iter().copied().collect();
        for p in preds {
            self.remove_edge(p, d);
        }
        for s in succs {
            self.remove_edge(d, s);
        }
        self.alive[d] = false;
    }

    fn merge_nets(&mut self, a: usize, b: usize) {
        let (root, absorbed) = self.nets.union(a, b);
        debug!(
            "Merging net {} into {}",
            self.nodes[absorbed].id, self.nodes[root].id
        );

        let preds: Vec<usize> = self.preds[absorbed].iter().copied().collect();
        let succs: Vec<usize> = self.succs[absorbed].iter().copied().collect();
        for p in preds {
            if let Some(attrs) = self.remove_edge(p, absorbed) {
                if p != root {
                    self.insert_edge_if_absent(p, root, attrs);
                }
            }
        }
        for s in succs {
            if let Some(attrs) = self.remove_edge(absorbed, s) {
                if s != root {
                    self.insert_edge_if_absent(root, s, attrs);
                }
            }
        }

        self.alive[absorbed] = false;
        self.absorbed.push(absorbed);
    }

    fn merged_nets(&mut self) -> Vec<(String, String)> {
        let absorbed = std::mem::take(&mut self.absorbed);
        absorbed
            .into_iter()
            .map(|net| {
                let root = self.nets.find(net);
                (self.nodes[net].id.clone(), self.nodes[root].id.clone())
            })
            .collect()
    }

    fn finish(self, source: &Graph) -> Graph {
        let mut graph = source
            .dialect()
            .map(Graph::with_dialect)
            .unwrap_or_default();
        for (i, node) in self.nodes.iter().enumerate() {
            if self.alive[i] {
                graph.add_node(node.id.clone(), node.category, node.type_label.clone());
            }
        }
        for ((from, to), attrs) in self.edges {
            // Endpoints are alive: removal and merging drop every incident edge.
            let (from, to) = (&self.nodes[from].id, &self.nodes[to].id);
            if let Err(e) = graph.add_edge(from, to, attrs) {
                debug!("Dropping edge {} -> {}: {}", from, to, e);
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Dialect, NET_TYPE, NodeCategory, PIN_TYPE};

    fn inst(g: &mut Graph, id: &str, ty: &str) {
        g.add_node(id, NodeCategory::Instance, ty);
    }

    fn net(g: &mut Graph, id: &str) {
        g.add_node(id, NodeCategory::Net, NET_TYPE);
    }

    fn link(g: &mut Graph, a: &str, b: &str) {
        g.add_edge(a, b, EdgeAttrs::default()).unwrap();
        g.add_edge(b, a, EdgeAttrs::default()).unwrap();
    }

    #[test]
    fn test_splice_directed_buffer() {
        let mut g = Graph::with_dialect(Dialect::InstancePort);
        g.add_node("PIN_in", NodeCategory::Pin, PIN_TYPE);
        inst(&mut g, "u1", "BUF");
        inst(&mut g, "u2", "AND");
        g.add_edge("PIN_in", "u1", EdgeAttrs::on_net("in")).unwrap();
        g.add_edge("u1", "u2", EdgeAttrs::on_net("mid")).unwrap();

        let out = collapse(&g, &CollapseConfig::default());
        assert_eq!(out.removed, vec!["u1".to_string()]);
        assert_eq!(out.graph.node_count(), 2);
        let attrs = out.graph.edge("PIN_in", "u2").unwrap();
        assert!(attrs.collapsed);
        assert_eq!(attrs.net_name.as_deref(), Some("mid"));
        assert_eq!(out.graph.dialect(), Some(Dialect::InstancePort));
    }

    #[test]
    fn test_buffer_chain_collapses_fully() {
        let mut g = Graph::new();
        inst(&mut g, "a", "DFF");
        inst(&mut g, "b1", "BUF");
        inst(&mut g, "b2", "INV");
        inst(&mut g, "z", "DFF");
        g.add_edge("a", "b1", EdgeAttrs::default()).unwrap();
        g.add_edge("b1", "b2", EdgeAttrs::default()).unwrap();
        g.add_edge("b2", "z", EdgeAttrs::default()).unwrap();

        let out = collapse(&g, &CollapseConfig::default());
        assert_eq!(out.removed_count(), 2);
        assert!(out.graph.has_edge("a", "z"));
        assert_eq!(out.graph.edge_count(), 1);
    }

    #[test]
    fn test_fanout_buffer_is_kept() {
        let mut g = Graph::new();
        inst(&mut g, "a", "DFF");
        inst(&mut g, "b", "BUF");
        inst(&mut g, "x", "AND");
        inst(&mut g, "y", "AND");
        g.add_edge("a", "b", EdgeAttrs::default()).unwrap();
        g.add_edge("b", "x", EdgeAttrs::default()).unwrap();
        g.add_edge("b", "y", EdgeAttrs::default()).unwrap();

        let out = collapse(&g, &CollapseConfig::default());
        assert!(out.removed.is_empty());
        assert_eq!(out.graph, g);
    }

    #[test]
    fn test_bipartite_dummy_merges_nets() {
        let mut g = Graph::with_dialect(Dialect::Connectivity);
        inst(&mut g, "m0", "nch");
        inst(&mut g, "d0", "DUMMY");
        inst(&mut g, "m1", "pch");
        net(&mut g, "NET_a");
        net(&mut g, "NET_b");
        link(&mut g, "m0", "NET_a");
        link(&mut g, "d0", "NET_a");
        link(&mut g, "d0", "NET_b");
        link(&mut g, "m1", "NET_b");

        let out = collapse(&g, &CollapseConfig::default());
        assert_eq!(out.removed, vec!["d0".to_string()]);
        assert_eq!(
            out.merged_nets,
            vec![("NET_b".to_string(), "NET_a".to_string())]
        );
        assert!(!out.graph.contains_node("NET_b"));
        assert!(out.graph.has_edge("m1", "NET_a"));
        assert!(out.graph.has_edge("NET_a", "m1"));
        assert!(out.graph.is_bipartite());
    }

    #[test]
    fn test_single_net_dummy_is_removed() {
        let mut g = Graph::with_dialect(Dialect::Connectivity);
        inst(&mut g, "m0", "nch");
        inst(&mut g, "d0", "DUMMY");
        net(&mut g, "NET_a");
        link(&mut g, "m0", "NET_a");
        link(&mut g, "d0", "NET_a");

        let out = collapse(&g, &CollapseConfig::default());
        assert_eq!(out.removed, vec!["d0".to_string()]);
        assert!(out.merged_nets.is_empty());
        assert_eq!(out.graph.node_count(), 2);
        assert_eq!(out.graph.edge_count(), 2);
    }

    #[test]
    fn test_chained_merges_report_final_representative() {
        let mut g = Graph::with_dialect(Dialect::Connectivity);
        net(&mut g, "NET_a");
        net(&mut g, "NET_b");
        net(&mut g, "NET_c");
        inst(&mut g, "d1", "DUMMY");
        inst(&mut g, "d2", "DUMMY");
        link(&mut g, "d2", "NET_b");
        link(&mut g, "d2", "NET_c");
        link(&mut g, "d1", "NET_a");
        link(&mut g, "d1", "NET_b");

        let out = collapse(&g, &CollapseConfig::default());
        assert_eq!(out.removed.len(), 2);
        assert_eq!(out.graph.node_count(), 1);
        for (_, rep) in &out.merged_nets {
            assert_eq!(rep, "NET_a");
        }
    }

    #[test]
    fn test_self_loop_dummy_is_kept() {
        let mut g = Graph::new();
        inst(&mut g, "b", "BUF");
        g.add_edge("b", "b", EdgeAttrs::default()).unwrap();
        let out = collapse(&g, &CollapseConfig::default());
        assert!(out.removed.is_empty());
    }

    #[test]
    fn test_custom_dummy_types() {
        let mut g = Graph::new();
        inst(&mut g, "a", "DFF");
        inst(&mut g, "b", "BUF");
        inst(&mut g, "z", "DFF");
        g.add_edge("a", "b", EdgeAttrs::default()).unwrap();
        g.add_edge("b", "z", EdgeAttrs::default()).unwrap();

        let out = collapse(&g, &CollapseConfig::new(["DLY"]));
        assert!(out.removed.is_empty());
    }
}
