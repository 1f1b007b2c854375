//! SSA-form intermediate representation for loop transforms.
//!
//! This crate provides the IR substrate the `loopforge-transform`
//! passes operate on:
//!
//! - [`Graph`]: blocks, instructions, and symmetric successor /
//!   predecessor adjacency, with phi inputs kept in lockstep with
//!   predecessor positions.
//! - Dominators (iterative Cooper-Harvey-Kennedy) and natural-loop
//!   analysis with innermost-wins membership.
//! - [`GraphChecker`]: structural validation with human-readable
//!   error messages.
//! - DOT export for debugging.

pub mod block;
pub mod checker;
pub mod dot;
pub mod error;
pub mod graph;
pub mod instruction;
pub mod loops;

pub use block::{BasicBlock, BlockId};
pub use checker::GraphChecker;
pub use error::Error;
pub use graph::Graph;
pub use instruction::{Environment, Instruction, InstructionId, InstructionKind, IrType};
pub use loops::{LoopId, LoopInfo};
