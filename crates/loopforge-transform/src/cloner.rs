//! Duplication of single-entry CFG regions with successor remapping.
//!
//! [`SuperblockCloner`] copies a set of blocks ("the region") together
//! with their instructions and deoptimization environments, then
//! rewires edges according to three caller-provided edge sets:
//!
//! - `orig_internal`: internal edges whose *original* end is moved to
//!   point at the copy region;
//! - `copy_internal`: internal edges whose *copy* is redirected back
//!   into the original region;
//! - `incoming`: edges from outside the region whose heads move to the
//!   copy region.
//!
//! Everything else is mechanical: outgoing edges are duplicated for
//! the copies, phi inputs follow predecessor indices, and control-flow
//! info (dominators, loops) is recomputed for the smallest enclosing
//! area afterwards. The two canonical remappings are loop peeling and
//! loop unrolling; see [`crate::peel_unroll`].

use crate::edge::{Edge, EdgeSet};
use crate::peel_unroll::collect_remapping_info_for_peel_unroll;
use fixedbitset::FixedBitSet;
use indexmap::IndexMap;
use loopforge_ir::{
    BlockId, Environment, Graph, GraphChecker, InstructionId, InstructionKind, LoopId,
};

/// The three successor-remapping edge sets for one clone operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemappingInfo {
    /// Internal edges whose original end is redirected to the copy.
    pub orig_internal: EdgeSet,
    /// Internal edges whose copy is redirected to the original.
    pub copy_internal: EdgeSet,
    /// Edges from outside the region redirected to the copy.
    pub incoming: EdgeSet,
}

/// Clones a single-entry region of a graph and remaps its edges.
///
/// The correspondence maps are caller-owned: after [`run`] they record
/// original-to-copy for every cloned block and instruction.
///
/// Lifecycle: construct, [`set_successor_remapping_info`], [`run`],
/// then [`clean_up`]. `run` leaves the graph structurally consistent
/// but possibly with redundant phis and unsplit critical edges, which
/// `clean_up` removes.
///
/// [`run`]: SuperblockCloner::run
/// [`set_successor_remapping_info`]: SuperblockCloner::set_successor_remapping_info
/// [`clean_up`]: SuperblockCloner::clean_up
pub struct SuperblockCloner<'g> {
    graph: &'g mut Graph,
    orig_bb_set: FixedBitSet,
    remapping: Option<RemappingInfo>,
    bb_map: &'g mut IndexMap<BlockId, BlockId>,
    hir_map: &'g mut IndexMap<InstructionId, InstructionId>,
    /// Smallest loop enclosing all region exits; `None` means the
    /// whole graph is re-analyzed.
    outer_loop: Option<LoopId>,
    outer_loop_bb_set: FixedBitSet,
    /// Region-defined values used outside the region, mapped to the
    /// exit phi that takes over those uses.
    live_outs: IndexMap<InstructionId, InstructionId>,
}

impl<'g> SuperblockCloner<'g> {
    /// Creates a cloner for the blocks set in `orig_bb_set`.
    pub fn new(
        graph: &'g mut Graph,
        orig_bb_set: &FixedBitSet,
        bb_map: &'g mut IndexMap<BlockId, BlockId>,
        hir_map: &'g mut IndexMap<InstructionId, InstructionId>,
    ) -> Self {
        let bound = graph.block_id_bound();
        let mut set = orig_bb_set.clone();
        set.grow(bound);
        Self {
            graph,
            orig_bb_set: set,
            remapping: None,
            bb_map,
            hir_map,
            outer_loop: None,
            outer_loop_bb_set: FixedBitSet::with_capacity(bound),
            live_outs: IndexMap::new(),
        }
    }

    /// Read access to the graph being transformed.
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Returns true if `block` belongs to the region.
    pub fn is_in_orig_bb_set(&self, block: BlockId) -> bool {
        self.orig_bb_set.contains(block.index())
    }

    /// Installs the successor remapping directives for [`run`].
    ///
    /// [`run`]: SuperblockCloner::run
    pub fn set_successor_remapping_info(&mut self, remapping: RemappingInfo) {
        debug_assert!(self.check_remapping_info_is_valid(&remapping));
        self.remapping = Some(remapping);
    }

    /// Checks that every directive names an existing edge with the
    /// required region membership: internal edges lie entirely in the
    /// region, incoming edges cross into it.
    pub fn check_remapping_info_is_valid(&self, remapping: &RemappingInfo) -> bool {
        for edge in remapping
            .orig_internal
            .iter()
            .chain(remapping.copy_internal.iter())
        {
            if !edge.is_valid(self.graph)
                || !self.is_in_orig_bb_set(edge.from())
                || !self.is_in_orig_bb_set(edge.to())
            {
                return false;
            }
        }
        for edge in &remapping.incoming {
            if !edge.is_valid(self.graph)
                || self.is_in_orig_bb_set(edge.from())
                || !self.is_in_orig_bb_set(edge.to())
            {
                return false;
            }
        }
        true
    }

    /// Returns true if the region can be cloned at all: no irreducible
    /// loops in the graph, every instruction clonable, and live-out
    /// values only through a single exit block.
    pub fn is_subgraph_clonable(&self) -> bool {
        if self.graph.has_irreducible_loops() {
            return false;
        }
        let mut live_outs = IndexMap::new();
        if !self.collect_live_outs_and_check_clonable(&mut live_outs) {
            return false;
        }
        if !live_outs.is_empty() && self.search_for_subgraph_exits().len() != 1 {
            return false;
        }
        true
    }

    /// Returns true if the region is exactly one loop's block set and
    /// the installed remapping matches the canonical peeling or
    /// unrolling shape for that loop. Only these shapes are supported.
    pub fn is_fast_case(&self) -> bool {
        let Some(remapping) = &self.remapping else {
            return false;
        };
        let mut common: Option<LoopId> = None;
        let mut first = true;
        for index in self.orig_bb_set.ones() {
            let block_loop = self.graph.loop_of(BlockId::new(index as u32));
            if first {
                common = block_loop;
                first = false;
            } else {
                common = find_common_loop(self.graph, common, block_loop);
            }
            if !first && common.is_none() {
                return false;
            }
        }
        let Some(common) = common else {
            return false;
        };
        let loop_blocks = &self.graph.loop_info(common).expect("loop exists").blocks;
        if !same_bits(&self.orig_bb_set, loop_blocks) {
            return false;
        }
        for to_unroll in [false, true] {
            if let Ok(canonical) =
                collect_remapping_info_for_peel_unroll(self.graph, to_unroll, common)
            {
                if canonical == *remapping {
                    return true;
                }
            }
        }
        false
    }

    /// The loop whose control-flow info was (or will be) re-analyzed;
    /// `None` means the whole graph.
    pub fn region_to_be_adjusted(&self) -> Option<LoopId> {
        self.outer_loop
    }

    /// Clones the region and remaps edges.
    ///
    /// On return the graph is structurally consistent with recomputed
    /// dominance and back edges, but loop membership of the area is
    /// not final and critical edges may exist; callers follow up with
    /// [`clean_up`].
    ///
    /// [`clean_up`]: SuperblockCloner::clean_up
    pub fn run(&mut self) {
        debug_assert!(self.remapping.is_some(), "remapping info must be set");
        debug_assert!(self.is_subgraph_clonable());
        debug_assert!(self.is_fast_case(), "only peel/unroll shapes are supported");

        let mut live_outs = IndexMap::new();
        let clonable = self.collect_live_outs_and_check_clonable(&mut live_outs);
        debug_assert!(clonable);
        self.live_outs = live_outs;

        self.find_and_set_local_area_for_adjustments();
        self.construct_subgraph_closed_ssa();
        self.clone_basic_blocks();
        self.remap_edges_successors();

        if cfg!(debug_assertions) {
            let mut work_set = FixedBitSet::with_capacity(self.graph.block_id_bound());
            for (&orig, &copy) in self.bb_map.iter() {
                work_set.insert(orig.index());
                work_set.insert(copy.index());
            }
            assert!(
                is_subgraph_connected(&mut work_set, self.graph),
                "cloned subgraph is not connected to the graph"
            );
        }

        self.adjust_control_flow_info();
        self.resolve_data_flow();
        self.fix_subgraph_closed_ssa_after_cloning();
    }

    /// Finalizes the graph after [`run`]: recomputes loop info for the
    /// affected area, splits critical edges, orders loop header
    /// predecessors, and removes phis made redundant by the remapping.
    ///
    /// [`run`]: SuperblockCloner::run
    pub fn clean_up(&mut self) {
        self.clean_up_control_flow();
        let pairs: Vec<(BlockId, BlockId)> =
            self.bb_map.iter().map(|(&orig, &copy)| (orig, copy)).collect();
        for (orig, copy) in pairs {
            self.eliminate_redundant_phis(orig);
            self.eliminate_redundant_phis(copy);
        }
        if cfg!(debug_assertions) {
            self.verify_graph();
        }
    }

    // --- Cloning ---

    /// Clones one block: copies phis (inputs cleared; they are rebuilt
    /// edge by edge), instructions (in-region inputs substituted with
    /// their copies), and environments. Records instruction
    /// correspondences in `hir_map`.
    pub fn clone_basic_block(&mut self, orig_block: BlockId) -> BlockId {
        let copy_block = self.graph.add_block();
        let (phis, instructions) = {
            let data = self.graph.block(orig_block).expect("region block exists");
            (data.phis.clone(), data.instructions.clone())
        };
        for phi in phis {
            let phi_copy = self.graph.clone_instruction(phi);
            self.graph.clear_phi_inputs(phi_copy);
            self.graph.add_phi(copy_block, phi_copy);
            self.hir_map.insert(phi, phi_copy);
        }
        for instr in instructions {
            let instr_copy = self.graph.clone_instruction(instr);
            self.hir_map.insert(instr, instr_copy);
            self.replace_inputs_with_copies(instr_copy);
            self.graph.add_instruction(copy_block, instr_copy);
            self.deep_clone_environment_with_remapping(instr, instr_copy);
        }
        copy_block
    }

    /// Clones every region block in reverse post-order, so values are
    /// always cloned before their in-region uses. Records block
    /// correspondences in `bb_map`.
    pub fn clone_basic_blocks(&mut self) {
        for block in self.graph.reverse_post_order() {
            if !self.is_in_orig_bb_set(block) {
                continue;
            }
            let copy = self.clone_basic_block(block);
            self.bb_map.insert(block, copy);
        }
    }

    fn replace_inputs_with_copies(&mut self, instr_copy: InstructionId) {
        let inputs = self
            .graph
            .instruction(instr_copy)
            .expect("copy exists")
            .inputs
            .clone();
        for (index, input) in inputs.into_iter().enumerate() {
            if !self.is_defined_in_region(input) {
                continue;
            }
            let input_copy = *self
                .hir_map
                .get(&input)
                .expect("region value cloned before its use");
            self.graph.replace_input(instr_copy, index, input_copy);
        }
    }

    /// Copies all deoptimization frames of `orig_instr` onto
    /// `instr_copy`, substituting region-defined slot values with
    /// their copies. The frames are fully independent of the
    /// originals.
    fn deep_clone_environment_with_remapping(
        &mut self,
        orig_instr: InstructionId,
        instr_copy: InstructionId,
    ) {
        let environments = self
            .graph
            .instruction(orig_instr)
            .expect("original exists")
            .environments
            .clone();
        if environments.is_empty() {
            return;
        }
        let mut cloned = Vec::with_capacity(environments.len());
        for env in &environments {
            let slots = env
                .slots()
                .iter()
                .map(|slot| match slot {
                    Some(value) if self.is_defined_in_region(*value) => Some(
                        *self
                            .hir_map
                            .get(value)
                            .expect("region value cloned before its use"),
                    ),
                    other => *other,
                })
                .collect();
            cloned.push(Environment::new(slots));
        }
        self.graph.set_environments(instr_copy, cloned);
    }

    // --- Live-outs and closed SSA ---

    /// Collects region-defined values used outside the region into
    /// `live_outs` (mapped to themselves for now). Returns false if
    /// the region contains a non-clonable instruction.
    fn collect_live_outs_and_check_clonable(
        &self,
        live_outs: &mut IndexMap<InstructionId, InstructionId>,
    ) -> bool {
        for index in self.orig_bb_set.ones() {
            let block = BlockId::new(index as u32);
            let data = self.graph.block(block).expect("region block exists");
            for &phi in &data.phis {
                if self.is_used_outside_region(phi) {
                    live_outs.insert(phi, phi);
                }
            }
            for &instr in &data.instructions {
                if !self
                    .graph
                    .instruction(instr)
                    .expect("instruction exists")
                    .kind
                    .is_clonable()
                {
                    return false;
                }
                if self.is_used_outside_region(instr) {
                    live_outs.insert(instr, instr);
                }
            }
        }
        true
    }

    fn is_used_outside_region(&self, value: InstructionId) -> bool {
        for user in self.graph.instructions() {
            let Some(block) = user.block() else { continue };
            if self.is_in_orig_bb_set(block) {
                continue;
            }
            if user.inputs.contains(&value) {
                return true;
            }
            if user
                .environments
                .iter()
                .any(|env| env.slots().contains(&Some(value)))
            {
                return true;
            }
        }
        false
    }

    /// Blocks outside the region that are successors of region blocks,
    /// one entry per exiting edge.
    pub fn search_for_subgraph_exits(&self) -> Vec<BlockId> {
        let mut exits = Vec::new();
        for index in self.orig_bb_set.ones() {
            let block = BlockId::new(index as u32);
            for &succ in self.graph.successors(block) {
                if !self.is_in_orig_bb_set(succ) {
                    exits.push(succ);
                }
            }
        }
        exits
    }

    /// Puts the region into closed-SSA form: for every live-out value,
    /// a phi in the single exit block takes over all external uses and
    /// starts with the original value as its only input. The clone's
    /// input is appended after cloning by
    /// [`fix_subgraph_closed_ssa_after_cloning`].
    ///
    /// [`fix_subgraph_closed_ssa_after_cloning`]: SuperblockCloner::fix_subgraph_closed_ssa_after_cloning
    fn construct_subgraph_closed_ssa(&mut self) {
        if self.live_outs.is_empty() {
            return;
        }
        let exits = self.search_for_subgraph_exits();
        debug_assert_eq!(exits.len(), 1);
        let Some(&exit_block) = exits.first() else {
            return;
        };
        debug_assert_eq!(self.graph.predecessors(exit_block).len(), 1);
        debug_assert!(self
            .graph
            .block(exit_block)
            .expect("exit exists")
            .phis
            .is_empty());

        let values: Vec<InstructionId> = self.live_outs.keys().copied().collect();
        for value in values {
            let ty = self.graph.instruction(value).expect("live-out exists").ty;
            let phi = self.graph.new_instruction(InstructionKind::Phi, ty, Vec::new());
            self.graph.add_phi(exit_block, phi);
            self.live_outs.insert(value, phi);
            let region = &self.orig_bb_set;
            self.graph.replace_uses_with(value, phi, |user| {
                user.block().is_some_and(|b| !region.contains(b.index()))
            });
            self.graph.add_phi_input(phi, value);
        }
    }

    fn fix_subgraph_closed_ssa_after_cloning(&mut self) {
        let entries: Vec<(InstructionId, InstructionId)> = self
            .live_outs
            .iter()
            .map(|(&value, &phi)| (value, phi))
            .collect();
        for (value, phi) in entries {
            debug_assert_ne!(value, phi);
            let value_copy = *self.hir_map.get(&value).expect("live-out was cloned");
            self.graph.add_phi_input(phi, value_copy);
        }
    }

    // --- Edge remapping ---

    /// Processes the incoming directives, then walks every region
    /// block's successor list and handles each edge by category.
    fn remap_edges_successors(&mut self) {
        let remapping = self.remapping.clone().expect("remapping info set");
        for edge in &remapping.incoming {
            self.remap_orig_internal_or_incoming_edge(edge.from(), edge.to());
        }
        let region: Vec<BlockId> = self
            .orig_bb_set
            .ones()
            .map(|index| BlockId::new(index as u32))
            .collect();
        for orig_block in region {
            for orig_succ in self.graph.successors(orig_block).to_vec() {
                if !self.is_in_orig_bb_set(orig_succ) {
                    // Outgoing edge: the copy exits the same way.
                    let copy_block = *self.bb_map.get(&orig_block).expect("block was cloned");
                    self.graph.add_edge(copy_block, orig_succ);
                    continue;
                }
                let edge = Edge::new(orig_block, orig_succ);
                if remapping.copy_internal.contains(&edge) {
                    self.remap_copy_internal_edge(orig_block, orig_succ);
                } else {
                    self.add_copy_internal_edge(orig_block, orig_succ);
                }
                if remapping.orig_internal.contains(&edge) {
                    self.remap_orig_internal_or_incoming_edge(orig_block, orig_succ);
                }
            }
        }
    }

    /// Redirects `orig_block -> orig_succ` to the copy of `orig_succ`.
    /// The phi input at the edge's predecessor index moves from each
    /// original phi to its copy, keeping both in lockstep with their
    /// predecessor lists.
    fn remap_orig_internal_or_incoming_edge(&mut self, orig_block: BlockId, orig_succ: BlockId) {
        let copy_succ = *self.bb_map.get(&orig_succ).expect("successor was cloned");
        let index = self
            .graph
            .pred_index_of(orig_succ, orig_block)
            .expect("edge to remap exists");
        let phis = self.graph.block(orig_succ).expect("block exists").phis.clone();
        for phi in phis {
            let phi_copy = *self.hir_map.get(&phi).expect("phi was cloned");
            let input = self.graph.instruction(phi).expect("phi exists").inputs[index];
            self.graph.remove_phi_input(phi, index);
            self.graph.add_phi_input(phi_copy, input);
        }
        self.graph.replace_successor(orig_block, orig_succ, copy_succ);
    }

    /// Mirrors an internal edge inside the copy region. Each copy phi
    /// gets the original phi's input for that edge.
    fn add_copy_internal_edge(&mut self, orig_block: BlockId, orig_succ: BlockId) {
        let copy_block = *self.bb_map.get(&orig_block).expect("block was cloned");
        let copy_succ = *self.bb_map.get(&orig_succ).expect("successor was cloned");
        self.graph.add_edge(copy_block, copy_succ);

        let index = self
            .graph
            .pred_index_of(orig_succ, orig_block)
            .expect("original edge exists");
        let phis = self.graph.block(orig_succ).expect("block exists").phis.clone();
        for phi in phis {
            let phi_copy = *self.hir_map.get(&phi).expect("phi was cloned");
            let input = self.graph.instruction(phi).expect("phi exists").inputs[index];
            self.graph.add_phi_input(phi_copy, input);
        }
    }

    /// Redirects the copy of an internal edge back into the original
    /// region: `copy(orig_block) -> orig_succ`. Each original phi gets
    /// a duplicate of its input for the original edge; it is fixed up
    /// by [`resolve_data_flow`].
    ///
    /// [`resolve_data_flow`]: SuperblockCloner::resolve_data_flow
    fn remap_copy_internal_edge(&mut self, orig_block: BlockId, orig_succ: BlockId) {
        let copy_block = *self.bb_map.get(&orig_block).expect("block was cloned");
        self.graph.add_edge(copy_block, orig_succ);

        let index = self
            .graph
            .pred_index_of(orig_succ, orig_block)
            .expect("original edge exists");
        let phis = self.graph.block(orig_succ).expect("block exists").phis.clone();
        for phi in phis {
            let input = self.graph.instruction(phi).expect("phi exists").inputs[index];
            self.graph.add_phi_input(phi, input);
        }
    }

    // --- Control-flow info adjustment ---

    /// Determines the smallest loop containing all region exits; when
    /// some exit leaves every loop, the whole graph is the area to
    /// re-analyze.
    fn find_and_set_local_area_for_adjustments(&mut self) {
        let exits = self.search_for_subgraph_exits();
        let mut outer: Option<LoopId> = None;
        let mut first = true;
        for exit in exits {
            let exit_loop = self.graph.loop_of(exit);
            if exit_loop.is_none() {
                outer = None;
                break;
            }
            outer = if first {
                exit_loop
            } else {
                find_common_loop(self.graph, outer, exit_loop)
            };
            first = false;
            if outer.is_none() {
                break;
            }
        }
        self.outer_loop = outer;
        self.outer_loop_bb_set = match outer {
            Some(id) => {
                let mut set = self
                    .graph
                    .loop_info(id)
                    .expect("outer loop exists")
                    .blocks
                    .clone();
                set.grow(self.graph.block_id_bound());
                set
            }
            None => FixedBitSet::with_capacity(self.graph.block_id_bound()),
        };
    }

    /// Recomputes back edges for the affected area and refreshes
    /// dominance for the whole graph.
    fn adjust_control_flow_info(&mut self) {
        let mut outer_set = FixedBitSet::with_capacity(self.graph.block_id_bound());
        self.recalculate_back_edges_info(&mut outer_set);
        self.graph.clear_dominance();
        self.graph.compute_dominance();
    }

    /// Resets loop state for every loop touching the area, re-finds
    /// back edges by local DFS, and drops stale innermost-loop records
    /// (non-headers and headers left without back edges). On return
    /// `outer_set` holds the area that was walked.
    fn recalculate_back_edges_info(&mut self, outer_set: &mut FixedBitSet) {
        outer_set.grow(self.graph.block_id_bound());
        let entry = match self.outer_loop {
            None => {
                for block in self.graph.block_ids().collect::<Vec<_>>() {
                    outer_set.insert(block.index());
                }
                self.graph.entry()
            }
            Some(outer) => {
                let mut area = self.outer_loop_bb_set.clone();
                area.grow(self.graph.block_id_bound());
                outer_set.union_with(&area);
                for &copy in self.bb_map.values() {
                    outer_set.insert(copy.index());
                }
                self.graph.loop_info(outer).expect("outer loop exists").header
            }
        };

        let touched: Vec<LoopId> = outer_set
            .ones()
            .filter_map(|index| self.graph.loop_of(BlockId::new(index as u32)))
            .collect();
        for id in touched {
            self.graph.reset_loop_block_data(id);
        }

        self.graph.find_back_edges_in(entry, outer_set);

        for index in outer_set.ones().collect::<Vec<_>>() {
            let block = BlockId::new(index as u32);
            if let Some(id) = self.graph.loop_of(block) {
                let info = self.graph.loop_info(id).expect("loop exists");
                if info.header != block || info.back_edges.is_empty() {
                    self.graph.set_innermost_loop(block, None);
                }
            }
        }
    }

    fn analyze_loops_locally(&mut self, local_set: &FixedBitSet) {
        self.graph.analyze_loops_in(local_set);
        for block in self.graph.post_order() {
            if self.graph.is_loop_header(block) {
                self.graph.order_loop_header_predecessors(block);
            }
        }
    }

    /// Full control-flow cleanup after remapping: re-find back edges,
    /// split critical edges, recompute dominance, repopulate loops,
    /// order loop header predecessors (back edges last).
    fn clean_up_control_flow(&mut self) {
        self.graph.clear_dominance();
        let mut outer_set = FixedBitSet::with_capacity(self.graph.block_id_bound());
        self.recalculate_back_edges_info(&mut outer_set);
        self.graph.simplify_cfg();
        self.graph.compute_dominance();
        self.analyze_loops_locally(&outer_set);
    }

    // --- Data-flow resolution ---

    /// Second phase of phi repair: for every original phi and its
    /// copy, inputs defined in the region whose predecessor lies
    /// outside the region are replaced with their copies.
    fn resolve_data_flow(&mut self) {
        let region: Vec<BlockId> = self.bb_map.keys().copied().collect();
        for orig_block in region {
            let phis = self.graph.block(orig_block).expect("block exists").phis.clone();
            for phi in phis {
                self.resolve_phi(phi);
                let phi_copy = *self.hir_map.get(&phi).expect("phi was cloned");
                self.resolve_phi(phi_copy);
            }
            if cfg!(debug_assertions) {
                let instructions = self
                    .graph
                    .block(orig_block)
                    .expect("block exists")
                    .instructions
                    .clone();
                for instr in instructions {
                    self.check_instruction_inputs_remapping(instr);
                }
            }
        }
    }

    fn resolve_phi(&mut self, phi: InstructionId) {
        let block = self
            .graph
            .instruction(phi)
            .expect("phi exists")
            .block()
            .expect("phi is inserted");
        let inputs = self.graph.instruction(phi).expect("phi exists").inputs.clone();
        for (index, input) in inputs.into_iter().enumerate() {
            if !self.is_defined_in_region(input) {
                continue;
            }
            let pred = self.graph.predecessors(block)[index];
            if !self.is_in_orig_bb_set(pred) {
                let input_copy = *self.hir_map.get(&input).expect("region value cloned");
                self.graph.replace_input(phi, index, input_copy);
            }
        }
    }

    /// Debug check: after resolution every input and environment value
    /// of an original instruction must dominate its use.
    fn check_instruction_inputs_remapping(&self, instr: InstructionId) {
        let data = self.graph.instruction(instr).expect("instruction exists");
        let block = data.block().expect("instruction is inserted");
        for &input in &data.inputs {
            let input_block = self
                .graph
                .instruction(input)
                .and_then(|i| i.block())
                .expect("input is inserted");
            debug_assert!(
                self.graph.dominates(input_block, block),
                "{input} does not dominate its use {instr}"
            );
        }
        for env in &data.environments {
            for value in env.slots().iter().flatten() {
                let value_block = self
                    .graph
                    .instruction(*value)
                    .and_then(|i| i.block())
                    .expect("environment value is inserted");
                debug_assert!(
                    self.graph.dominates(value_block, block),
                    "{value} does not dominate its environment use in {instr}"
                );
            }
        }
    }

    // --- Cleanup helpers ---

    /// Removes phis whose inputs are all the same value, rewriting
    /// their uses to that value.
    fn eliminate_redundant_phis(&mut self, block: BlockId) {
        let phis = self.graph.block(block).expect("block exists").phis.clone();
        for phi in phis {
            let (first, trivial) = {
                let inputs = &self.graph.instruction(phi).expect("phi exists").inputs;
                match inputs.first() {
                    Some(&first) => (first, inputs.iter().all(|&input| input == first)),
                    None => continue,
                }
            };
            if trivial && first != phi {
                self.graph.replace_uses_with(phi, first, |_| true);
                self.graph.remove_phi(block, phi);
            }
        }
    }

    fn verify_graph(&self) {
        let mut checker = GraphChecker::new(self.graph);
        checker.run();
        if !checker.is_valid() {
            for error in checker.errors() {
                eprintln!("graph checker: {error}");
            }
            panic!("graph checker failed after superblock cloning");
        }
    }

    fn is_defined_in_region(&self, value: InstructionId) -> bool {
        self.graph
            .instruction(value)
            .and_then(|instr| instr.block())
            .is_some_and(|block| self.is_in_orig_bb_set(block))
    }
}

/// Checks that every block in `work_set` is reachable from outside the
/// set. Bits are cleared as blocks are reached; on return the set
/// holds exactly the unreachable blocks, and the result is true if
/// there were none.
pub fn is_subgraph_connected(work_set: &mut FixedBitSet, graph: &Graph) -> bool {
    let entries: Vec<BlockId> = work_set
        .ones()
        .map(|index| BlockId::new(index as u32))
        .filter(|&block| {
            graph
                .predecessors(block)
                .iter()
                .any(|pred| !work_set.contains(pred.index()))
        })
        .collect();
    for entry in entries {
        if !work_set.contains(entry.index()) {
            continue;
        }
        work_set.remove(entry.index());
        let mut stack = vec![entry];
        while let Some(block) = stack.pop() {
            for &succ in graph.successors(block) {
                if work_set.contains(succ.index()) {
                    work_set.remove(succ.index());
                    stack.push(succ);
                }
            }
        }
    }
    work_set.count_ones(..) == 0
}

/// The innermost loop containing both loops, walking outwards from
/// `loop1`. `None` if either argument is `None` or no common
/// enclosing loop exists; symmetric in its arguments.
pub fn find_common_loop(
    graph: &Graph,
    loop1: Option<LoopId>,
    loop2: Option<LoopId>,
) -> Option<LoopId> {
    let (loop1, loop2) = (loop1?, loop2?);
    if graph.is_loop_in(loop1, loop2) {
        return Some(loop2);
    }
    let mut current = Some(loop1);
    while let Some(candidate) = current {
        if graph.is_loop_in(loop2, candidate) {
            return Some(candidate);
        }
        current = graph.outer_loop_of(candidate);
    }
    None
}

fn same_bits(a: &FixedBitSet, b: &FixedBitSet) -> bool {
    a.ones().eq(b.ones())
}
