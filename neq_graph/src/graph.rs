//! Netlist connectivity graph.
//!
//! A [`Graph`] is an ordered map of node ids to node records plus an ordered,
//! de-duplicated edge set. Insertion order is the node ordering snapshot used
//! by the matcher, so two builds of the same text always agree.

use contracts::*;
use indexmap::IndexMap;
use neq_common::NodeIdx;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Type label given to net nodes.
pub const NET_TYPE: &str = "NET";
/// Type label given to synthetic port nodes.
pub const PIN_TYPE: &str = "PIN";

/// Errors raised by graph mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge referenced a node id that is not in the graph.
    #[error("Edge endpoint '{0}' is not a node of the graph")]
    MissingNode(String),
}

/// Netlist dialect a graph was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `Type Name ( port(net), ... ) ;` statements with named ports.
    InstancePort,
    /// `name ( net1 net2 ... ) celltype` lines with positional nets.
    Connectivity,
}

impl Dialect {
    /// Picks the grammar for `text`: module markers or any `;` select
    /// [`Dialect::InstancePort`], anything else [`Dialect::Connectivity`].
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.contains("module ") || text.contains("endmodule") || text.contains(';') {
            Self::InstancePort
        } else {
            Self::Connectivity
        }
    }
}

/// Structural role of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    /// A component instance.
    Instance,
    /// A net (connectivity dialect only).
    Net,
    /// A synthetic source for an undriven net.
    Pin,
}

/// One node of the graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Node {
    /// Unique node id.
    pub id: String,
    /// Structural role.
    pub category: NodeCategory,
    /// Cell type, or `NET` / `PIN` for structural nodes.
    pub type_label: String,
}

impl Node {
    /// Returns true for net nodes.
    #[must_use]
    pub fn is_net(&self) -> bool {
        self.category == NodeCategory::Net
    }

    /// Returns true for component instances.
    #[must_use]
    pub fn is_instance(&self) -> bool {
        self.category == NodeCategory::Instance
    }
}

/// Attributes carried by an edge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeAttrs {
    /// Net the edge was derived from, when known.
    pub net_name: Option<String>,
    /// Set on edges introduced by dummy collapsing.
    pub collapsed: bool,
}

impl EdgeAttrs {
    /// Attributes for an edge derived from `net`.
    pub fn on_net(net: impl Into<String>) -> Self {
        Self {
            net_name: Some(net.into()),
            collapsed: false,
        }
    }

    /// Attributes for an edge created by splicing out a dummy cell.
    #[must_use]
    pub const fn spliced(net_name: Option<String>) -> Self {
        Self {
            net_name,
            collapsed: true,
        }
    }
}

/// Borrowed view of one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge<'g> {
    /// Source node id.
    pub from: &'g str,
    /// Target node id.
    pub to: &'g str,
    /// Edge attributes.
    pub attrs: &'g EdgeAttrs,
}

/// A netlist graph of instances, nets and synthetic pins.
///
/// Equality compares node records and edges as sets, ignoring insertion
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Graph {
    dialect: Option<Dialect>,
    nodes: IndexMap<String, Node>,
    edges: IndexMap<(String, String), EdgeAttrs>,
}

impl Graph {
    /// Creates an empty graph with no recorded dialect.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph built from `dialect`.
    #[must_use]
    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect: Some(dialect),
            ..Self::default()
        }
    }

    /// Dialect the graph was built from, if any.
    #[must_use]
    pub const fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// Adds a node, or updates category and type of an existing id.
    ///
    /// Returns true if the id was new.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        category: NodeCategory,
        type_label: impl Into<String>,
    ) -> bool {
        let id = id.into();
        let type_label = type_label.into();
        if let Some(existing) = self.nodes.get_mut(&id) {
            existing.category = category;
            existing.type_label = type_label;
            return false;
        }
        self.nodes.insert(
            id.clone(),
            Node {
                id,
                category,
                type_label,
            },
        );
        true
    }

    /// Adds a directed edge; re-adding an existing pair replaces its attributes.
    #[ensures(ret.is_ok() -> self.has_edge(from, to))]
    pub fn add_edge(&mut self, from: &str, to: &str, attrs: EdgeAttrs) -> Result<(), GraphError> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::MissingNode(endpoint.to_string()));
            }
        }
        self.edges
            .insert((from.to_string(), to.to_string()), attrs);
        Ok(())
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let node = self.nodes.shift_remove(id)?;
        self.edges.retain(|(from, to), _| from != id && to != id);
        Some(node)
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns true if `id` is a node of the graph.
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns `base` if no node carries it, otherwise the first free
    /// `base#k` for k = 1, 2, ...
    #[must_use]
    pub fn fresh_id(&self, base: &str) -> String {
        if !self.contains_node(base) {
            return base.to_string();
        }
        let mut k = 1usize;
        loop {
            let candidate = format!("{base}#{k}");
            if !self.contains_node(&candidate) {
                return candidate;
            }
            k += 1;
        }
    }

    /// Position of `id` in the node ordering snapshot.
    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<NodeIdx> {
        self.nodes.get_index_of(id).map(NodeIdx::from)
    }

    /// Node at position `idx` of the ordering snapshot.
    #[must_use]
    pub fn node_at(&self, idx: NodeIdx) -> Option<&Node> {
        self.nodes.get_index(idx.as_usize()).map(|(_, node)| node)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.edges.iter().map(|((from, to), attrs)| Edge {
            from: from.as_str(),
            to: to.as_str(),
            attrs,
        })
    }

    /// Attributes of the edge `from -> to`, if present.
    #[must_use]
    pub fn edge(&self, from: &str, to: &str) -> Option<&EdgeAttrs> {
        self.edges.get(&(from.to_string(), to.to_string()))
    }

    /// Returns true if the edge `from -> to` exists.
    #[must_use]
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edge(from, to).is_some()
    }

    /// Distinct predecessors of `id`, in edge order.
    #[must_use]
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.edges()
            .filter(|e| e.to == id)
            .map(|e| e.from)
            .collect()
    }

    /// Distinct successors of `id`, in edge order.
    #[must_use]
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.edges()
            .filter(|e| e.from == id)
            .map(|e| e.to)
            .collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct directed edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true if every edge joins exactly one instance to one net.
    #[must_use]
    pub fn is_bipartite(&self) -> bool {
        self.edges().all(|e| {
            match (self.nodes.get(e.from), self.nodes.get(e.to)) {
                (Some(a), Some(b)) => {
                    (a.is_instance() && b.is_net()) || (a.is_net() && b.is_instance())
                }
                _ => false,
            }
        })
    }

    /// Returns a copy with every node id passed through `rename`.
    ///
    /// `rename` must be injective over the graph's ids.
    #[must_use]
    pub fn relabel(&self, rename: impl Fn(&str) -> String) -> Self {
        let nodes = self
            .nodes
            .values()
            .map(|node| {
                let id = rename(&node.id);
                (
                    id.clone(),
                    Node {
                        id,
                        category: node.category,
                        type_label: node.type_label.clone(),
                    },
                )
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|((from, to), attrs)| ((rename(from), rename(to)), attrs.clone()))
            .collect();
        Self {
            dialect: self.dialect,
            nodes,
            edges,
        }
    }
}

impl Serialize for Graph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct EdgeRecord<'g> {
            from: &'g str,
            to: &'g str,
            #[serde(flatten)]
            attrs: &'g EdgeAttrs,
        }

        let edges: Vec<EdgeRecord<'_>> = self
            .edges()
            .map(|e| EdgeRecord {
                from: e.from,
                to: e.to,
                attrs: e.attrs,
            })
            .collect();

        let mut state = serializer.serialize_struct("Graph", 3)?;
        state.serialize_field("dialect", &self.dialect)?;
        state.serialize_field("nodes", &self.nodes.values().collect::<Vec<_>>())?;
        state.serialize_field("edges", &edges)?;
        state.end()
    }
}
