//! Error types for IR construction and queries.

use crate::{BlockId, LoopId};
use thiserror::Error;

/// Errors produced by graph queries and mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A block id that does not belong to the graph.
    #[error("unknown basic block: {0}")]
    UnknownBlock(BlockId),

    /// A loop id that does not belong to the graph.
    #[error("unknown loop: {0}")]
    UnknownLoop(LoopId),

    /// The loop has no predecessor of its header outside its back edges.
    #[error("{0} has no pre-header")]
    NoPreHeader(LoopId),
}
