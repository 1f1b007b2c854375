//! Loop peeling and unrolling on top of the superblock cloner.
//!
//! Both transforms clone a loop's body once; they differ only in how
//! the edges are remapped:
//!
//! - Peeling redirects the loop's incoming edge to the copy, so the
//!   copy runs exactly once before the original loop. The original
//!   keeps the back edges and stays the loop.
//! - Unrolling redirects the back edges through the copy, so original
//!   and copy alternate. The combined region becomes the loop, still
//!   headed by the original header.

use crate::cloner::{RemappingInfo, SuperblockCloner};
use crate::edge::Edge;
use crate::error::TransformError;
use indexmap::IndexMap;
use loopforge_ir::{BlockId, Graph, InstructionId, LoopId};

/// Builds the canonical remapping for peeling (`to_unroll` false) or
/// unrolling (`to_unroll` true) of `loop_id`.
///
/// Peeling remaps the back edges' copies into the original region and
/// moves the pre-header edge to the copy; unrolling remaps the back
/// edges both ways and leaves incoming edges alone.
pub fn collect_remapping_info_for_peel_unroll(
    graph: &Graph,
    to_unroll: bool,
    loop_id: LoopId,
) -> Result<RemappingInfo, TransformError> {
    let info = graph
        .loop_info(loop_id)
        .ok_or(TransformError::UnknownLoop(loop_id))?;
    let header = info.header;
    let mut remapping = RemappingInfo::default();
    for &back_edge in &info.back_edges {
        let edge = Edge::new(back_edge, header);
        remapping.copy_internal.insert(edge);
        if to_unroll {
            remapping.orig_internal.insert(edge);
        }
    }
    if !to_unroll {
        let pre_header = graph.pre_header(loop_id)?;
        remapping.incoming.insert(Edge::new(pre_header, header));
    }
    Ok(remapping)
}

/// Drives one peel or unroll of a single loop.
///
/// The helper borrows the graph and the caller-owned correspondence
/// maps for its lifetime; [`peel_loop`] and [`unroll_loop`] are the
/// convenience wrappers that own the maps themselves.
pub struct PeelUnrollHelper<'g> {
    loop_id: LoopId,
    cloner: SuperblockCloner<'g>,
}

impl<'g> PeelUnrollHelper<'g> {
    /// Creates a helper for `loop_id`. Fails if the id does not name a
    /// current loop or the loop is irreducible.
    pub fn try_new(
        graph: &'g mut Graph,
        loop_id: LoopId,
        bb_map: &'g mut IndexMap<BlockId, BlockId>,
        hir_map: &'g mut IndexMap<InstructionId, InstructionId>,
    ) -> Result<Self, TransformError> {
        let blocks = {
            let info = graph
                .loop_info(loop_id)
                .ok_or(TransformError::UnknownLoop(loop_id))?;
            if info.irreducible {
                return Err(TransformError::IrreducibleLoop(loop_id));
            }
            info.blocks.clone()
        };
        Ok(Self {
            loop_id,
            cloner: SuperblockCloner::new(graph, &blocks, bb_map, hir_map),
        })
    }

    /// Returns true if the loop's body can be duplicated at all.
    pub fn is_loop_clonable(&self) -> bool {
        self.cloner.is_subgraph_clonable()
    }

    /// Peels one iteration off the front of the loop. Returns the loop
    /// header, which still heads the (now shorter-trip) loop.
    pub fn do_peeling(&mut self) -> Result<BlockId, TransformError> {
        self.do_peel_unroll_impl(false)
    }

    /// Unrolls the loop by a factor of two. Returns the loop header.
    pub fn do_unrolling(&mut self) -> Result<BlockId, TransformError> {
        self.do_peel_unroll_impl(true)
    }

    /// The loop whose analysis info the transform re-derived; `None`
    /// means the whole graph was re-analyzed.
    pub fn region_to_be_adjusted(&self) -> Option<LoopId> {
        self.cloner.region_to_be_adjusted()
    }

    fn do_peel_unroll_impl(&mut self, to_unroll: bool) -> Result<BlockId, TransformError> {
        let header = self
            .cloner
            .graph()
            .loop_info(self.loop_id)
            .ok_or(TransformError::UnknownLoop(self.loop_id))?
            .header;
        let remapping =
            collect_remapping_info_for_peel_unroll(self.cloner.graph(), to_unroll, self.loop_id)?;
        self.cloner.set_successor_remapping_info(remapping);
        self.cloner.run();
        self.cloner.clean_up();
        Ok(header)
    }
}

/// Outcome of a [`peel_loop`] or [`unroll_loop`] call.
#[derive(Debug)]
pub struct PeelUnrollResult {
    /// The transformed loop's header.
    pub header: BlockId,
    /// Loop whose analysis info was re-derived locally; `None` if the
    /// whole graph was re-analyzed.
    pub region_to_be_adjusted: Option<LoopId>,
    /// Original block to its copy, for every cloned block.
    pub bb_map: IndexMap<BlockId, BlockId>,
    /// Original instruction to its copy, for every cloned instruction.
    pub hir_map: IndexMap<InstructionId, InstructionId>,
}

/// Peels one iteration off the front of `loop_id`.
pub fn peel_loop(graph: &mut Graph, loop_id: LoopId) -> Result<PeelUnrollResult, TransformError> {
    peel_unroll(graph, loop_id, false)
}

/// Unrolls `loop_id` by a factor of two.
pub fn unroll_loop(graph: &mut Graph, loop_id: LoopId) -> Result<PeelUnrollResult, TransformError> {
    peel_unroll(graph, loop_id, true)
}

fn peel_unroll(
    graph: &mut Graph,
    loop_id: LoopId,
    to_unroll: bool,
) -> Result<PeelUnrollResult, TransformError> {
    let mut bb_map = IndexMap::new();
    let mut hir_map = IndexMap::new();
    let (header, region_to_be_adjusted) = {
        let mut helper = PeelUnrollHelper::try_new(graph, loop_id, &mut bb_map, &mut hir_map)?;
        let header = if to_unroll {
            helper.do_unrolling()?
        } else {
            helper.do_peeling()?
        };
        (header, helper.region_to_be_adjusted())
    };
    Ok(PeelUnrollResult {
        header,
        region_to_be_adjusted,
        bb_map,
        hir_map,
    })
}
