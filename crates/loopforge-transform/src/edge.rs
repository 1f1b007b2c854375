//! Control-flow edges as small value types.

use indexmap::IndexSet;
use loopforge_ir::{BlockId, Graph};
use std::fmt;

/// A directed edge between two basic blocks, identified by block ids
/// rather than borrowed blocks so edge sets can outlive graph
/// mutations. Cheap to copy and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    from: BlockId,
    to: BlockId,
}

impl Edge {
    /// Creates an edge `from -> to`.
    pub fn new(from: BlockId, to: BlockId) -> Self {
        Self { from, to }
    }

    /// The source block.
    pub fn from(&self) -> BlockId {
        self.from
    }

    /// The target block.
    pub fn to(&self) -> BlockId {
        self.to
    }

    /// Returns true if both blocks exist in `graph` and the edge is in
    /// its successor lists.
    pub fn is_valid(&self, graph: &Graph) -> bool {
        graph.block(self.from).is_some()
            && graph.block(self.to).is_some()
            && graph.successors(self.from).contains(&self.to)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}->{})", self.from, self.to)
    }
}

/// A deterministic-order set of edges.
pub type EdgeSet = IndexSet<Edge>;

#[cfg(test)]
mod tests {
    use super::*;

    // --- Edge Tests ---

    #[test]
    fn test_edge_accessors_and_display() {
        let e = Edge::new(BlockId::new(1), BlockId::new(2));
        assert_eq!(e.from(), BlockId::new(1));
        assert_eq!(e.to(), BlockId::new(2));
        assert_eq!(e.to_string(), "(bb1->bb2)");
    }

    #[test]
    fn test_edge_equality_and_hash() {
        let a = Edge::new(BlockId::new(1), BlockId::new(2));
        let b = Edge::new(BlockId::new(1), BlockId::new(2));
        let c = Edge::new(BlockId::new(2), BlockId::new(1));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = EdgeSet::default();
        set.insert(a);
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_edge_is_valid() {
        let mut g = Graph::new();
        let a = g.add_block();
        let b = g.add_block();
        g.add_edge(a, b);
        assert!(Edge::new(a, b).is_valid(&g));
        assert!(!Edge::new(b, a).is_valid(&g));
        assert!(!Edge::new(a, BlockId::new(9)).is_valid(&g));
    }
}
