//! Error types for the loop transforms.

use loopforge_ir::LoopId;
use thiserror::Error;

/// Errors reported by the peel/unroll entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The loop id does not name a current loop of the graph.
    #[error("{0} is not a loop of this graph")]
    UnknownLoop(LoopId),

    /// The loop can be entered other than through its header, which
    /// the cloner does not support.
    #[error("{0} is irreducible")]
    IrreducibleLoop(LoopId),

    /// A graph query failed.
    #[error(transparent)]
    Graph(#[from] loopforge_ir::Error),
}
