//! Basic blocks and their identifiers.

use crate::InstructionId;
use std::fmt;

/// Unique identifier for a basic block within a graph.
///
/// Ids are assigned monotonically and never reused, so they double as
/// stable indices into bit sets sized by [`Graph::block_id_bound`].
///
/// [`Graph::block_id_bound`]: crate::Graph::block_id_bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockId(pub u32);

impl BlockId {
    /// Creates a new block id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the id as a bit-set index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block: an ordered phi list followed by an ordered
/// instruction list ending in a terminator.
///
/// Edges are not stored here; the graph owns the successor and
/// predecessor lists so that adjacency stays symmetric.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlock {
    /// This block's id.
    pub id: BlockId,
    /// Phi instructions, in insertion order.
    pub phis: Vec<InstructionId>,
    /// Non-phi instructions, in execution order.
    pub instructions: Vec<InstructionId>,
}

impl BasicBlock {
    /// Creates an empty block with the given id.
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            phis: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// Returns the last (terminator) instruction, if any.
    pub fn last_instruction(&self) -> Option<InstructionId> {
        self.instructions.last().copied()
    }

    /// Returns true if the block holds no phis and no instructions.
    pub fn is_empty(&self) -> bool {
        self.phis.is_empty() && self.instructions.is_empty()
    }
}
