use contracts::*;
use std::fmt;

/// Dense position of a node inside one graph's ordering snapshot.
///
/// Indices are only meaningful for the graph they were taken from; matrix
/// rows and columns in the matcher use the same numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx {
    inner: u32,
}

impl NodeIdx {
    /// Creates a node index from a raw integer.
    #[ensures(ret.inner == id)]
    pub const fn new(id: u32) -> Self {
        Self { inner: id }
    }

    /// Row or column this node occupies.
    #[ensures(ret == self.inner as usize)]
    pub const fn as_usize(self) -> usize {
        self.inner as usize
    }

    /// Every index of a snapshot holding `len` nodes, in order.
    pub fn range(len: usize) -> impl ExactSizeIterator<Item = Self> + Clone {
        (0..len).map(Self::from)
    }
}

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.inner)
    }
}

impl From<usize> for NodeIdx {
    #[inline]
    fn from(position: usize) -> Self {
        Self {
            inner: position as u32,
        }
    }
}

impl From<NodeIdx> for usize {
    #[inline]
    fn from(idx: NodeIdx) -> Self {
        idx.as_usize()
    }
}
