//! Loop peeling and unrolling via superblock cloning.
//!
//! The central piece is [`SuperblockCloner`], which duplicates a
//! single-entry region of a [`Graph`](loopforge_ir::Graph) and remaps
//! its edges according to a [`RemappingInfo`]. [`peel_loop`] and
//! [`unroll_loop`] build the two supported remappings and drive the
//! cloner end to end, leaving the graph with valid dominance, loop
//! info, and phi placement.
//!
//! ```
//! use loopforge_ir::{Graph, InstructionKind, IrType};
//! use loopforge_transform::peel_loop;
//!
//! let mut g = Graph::new();
//! let entry = g.add_block();
//! let header = g.add_block();
//! let body = g.add_block();
//! let exit = g.add_block();
//! g.add_edge(entry, header);
//! g.add_edge(header, exit);
//! g.add_edge(header, body);
//! g.add_edge(body, header);
//!
//! let cond = g.append_instruction(entry, InstructionKind::IntConstant(0), IrType::Bool, vec![]);
//! g.append_instruction(entry, InstructionKind::Goto, IrType::Void, vec![]);
//! g.append_instruction(header, InstructionKind::If, IrType::Void, vec![cond]);
//! g.append_instruction(body, InstructionKind::Goto, IrType::Void, vec![]);
//! g.append_instruction(exit, InstructionKind::Return, IrType::Void, vec![]);
//! g.build_dominator_tree();
//!
//! let loop_id = g.loop_of(header).unwrap();
//! let result = peel_loop(&mut g, loop_id).unwrap();
//! assert_eq!(result.header, header);
//! assert_eq!(result.bb_map.len(), 2);
//! ```

pub mod cloner;
pub mod edge;
pub mod error;
pub mod peel_unroll;

pub use cloner::{find_common_loop, is_subgraph_connected, RemappingInfo, SuperblockCloner};
pub use edge::{Edge, EdgeSet};
pub use error::TransformError;
pub use peel_unroll::{
    collect_remapping_info_for_peel_unroll, peel_loop, unroll_loop, PeelUnrollHelper,
    PeelUnrollResult,
};
