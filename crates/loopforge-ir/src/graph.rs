//! The control-flow graph: blocks, instructions, edges, dominators.

use crate::{BasicBlock, BlockId, Environment, Instruction, InstructionId, InstructionKind, IrType};
use crate::loops::LoopInfo;
use crate::LoopId;
use fixedbitset::FixedBitSet;
use indexmap::IndexMap;

/// A control-flow graph in SSA form.
///
/// Blocks and instructions live in id-keyed stores with deterministic
/// iteration order. Adjacency is kept symmetric: every successor entry
/// has a matching predecessor entry. Phi inputs are kept in lockstep
/// with predecessor positions, so all edge mutations below state what
/// they do to predecessor indices.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Graph {
    entry: BlockId,
    pub(crate) blocks: IndexMap<BlockId, BasicBlock>,
    pub(crate) succs: IndexMap<BlockId, Vec<BlockId>>,
    pub(crate) preds: IndexMap<BlockId, Vec<BlockId>>,
    pub(crate) instrs: IndexMap<InstructionId, Instruction>,
    /// Immediate dominators; the entry maps to itself. Empty when
    /// dominance has been invalidated.
    pub(crate) idom: IndexMap<BlockId, BlockId>,
    pub(crate) loops: IndexMap<LoopId, LoopInfo>,
    /// Innermost loop of each block. Headers map to their own loop.
    pub(crate) block_loop: IndexMap<BlockId, LoopId>,
    next_block_id: u32,
    next_instr_id: u32,
    pub(crate) next_loop_id: u32,
}

impl Graph {
    /// Creates an empty graph. The first block added becomes the entry.
    pub fn new() -> Self {
        Self {
            entry: BlockId::new(0),
            blocks: IndexMap::new(),
            succs: IndexMap::new(),
            preds: IndexMap::new(),
            instrs: IndexMap::new(),
            idom: IndexMap::new(),
            loops: IndexMap::new(),
            block_loop: IndexMap::new(),
            next_block_id: 0,
            next_instr_id: 0,
            next_loop_id: 0,
        }
    }

    /// The entry block.
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// One past the largest block id ever assigned. Bit sets indexed
    /// by block id must be at least this large.
    pub fn block_id_bound(&self) -> usize {
        self.next_block_id as usize
    }

    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates over all block ids in creation order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.keys().copied()
    }

    /// Iterates over all instructions in creation order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.instrs.values()
    }

    // --- Block and instruction construction ---

    /// Adds an empty block and returns its id.
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId::new(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(id, BasicBlock::new(id));
        self.succs.insert(id, Vec::new());
        self.preds.insert(id, Vec::new());
        id
    }

    /// Looks up a block.
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    /// Looks up a block mutably.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(&id)
    }

    /// Creates a detached instruction and returns its id.
    pub fn new_instruction(
        &mut self,
        kind: InstructionKind,
        ty: IrType,
        inputs: Vec<InstructionId>,
    ) -> InstructionId {
        let id = InstructionId::new(self.next_instr_id);
        self.next_instr_id += 1;
        self.instrs.insert(id, Instruction::new(id, kind, ty, inputs));
        id
    }

    /// Creates a detached copy of an instruction: same kind, type and
    /// inputs, but no block and no environments.
    pub fn clone_instruction(&mut self, source: InstructionId) -> InstructionId {
        let (kind, ty, inputs) = {
            let instr = &self.instrs[&source];
            (instr.kind, instr.ty, instr.inputs.clone())
        };
        self.new_instruction(kind, ty, inputs)
    }

    /// Appends a detached non-phi instruction to a block's instruction
    /// list.
    pub fn add_instruction(&mut self, block: BlockId, instr: InstructionId) {
        debug_assert!(!self.instrs[&instr].is_phi());
        self.instrs
            .get_mut(&instr)
            .expect("instruction belongs to this graph")
            .block = Some(block);
        self.blocks
            .get_mut(&block)
            .expect("block belongs to this graph")
            .instructions
            .push(instr);
    }

    /// Appends a detached phi to a block's phi list.
    pub fn add_phi(&mut self, block: BlockId, phi: InstructionId) {
        debug_assert!(self.instrs[&phi].is_phi());
        self.instrs
            .get_mut(&phi)
            .expect("instruction belongs to this graph")
            .block = Some(block);
        self.blocks
            .get_mut(&block)
            .expect("block belongs to this graph")
            .phis
            .push(phi);
    }

    /// Creates an instruction and appends it to a block in one step.
    pub fn append_instruction(
        &mut self,
        block: BlockId,
        kind: InstructionKind,
        ty: IrType,
        inputs: Vec<InstructionId>,
    ) -> InstructionId {
        let id = self.new_instruction(kind, ty, inputs);
        self.add_instruction(block, id);
        id
    }

    /// Looks up an instruction.
    pub fn instruction(&self, id: InstructionId) -> Option<&Instruction> {
        self.instrs.get(&id)
    }

    /// Looks up an instruction mutably.
    pub fn instruction_mut(&mut self, id: InstructionId) -> Option<&mut Instruction> {
        self.instrs.get_mut(&id)
    }

    /// Removes a phi from its block and from the instruction store.
    /// The caller must have rewritten all uses first.
    pub fn remove_phi(&mut self, block: BlockId, phi: InstructionId) {
        if let Some(b) = self.blocks.get_mut(&block) {
            b.phis.retain(|&p| p != phi);
        }
        self.instrs.shift_remove(&phi);
    }

    // --- Inputs, phi inputs, environments ---

    /// Replaces input `index` of an instruction.
    pub fn replace_input(&mut self, user: InstructionId, index: usize, value: InstructionId) {
        self.instrs
            .get_mut(&user)
            .expect("instruction belongs to this graph")
            .inputs[index] = value;
    }

    /// Appends an input to a phi. The corresponding predecessor must
    /// be (or become) the last entry of the block's predecessor list.
    pub fn add_phi_input(&mut self, phi: InstructionId, value: InstructionId) {
        let instr = self
            .instrs
            .get_mut(&phi)
            .expect("instruction belongs to this graph");
        debug_assert!(instr.is_phi());
        instr.inputs.push(value);
    }

    /// Removes the phi input at `index`, shifting later inputs down.
    pub fn remove_phi_input(&mut self, phi: InstructionId, index: usize) {
        let instr = self
            .instrs
            .get_mut(&phi)
            .expect("instruction belongs to this graph");
        debug_assert!(instr.is_phi());
        instr.inputs.remove(index);
    }

    /// Removes all inputs of a phi.
    pub fn clear_phi_inputs(&mut self, phi: InstructionId) {
        let instr = self
            .instrs
            .get_mut(&phi)
            .expect("instruction belongs to this graph");
        debug_assert!(instr.is_phi());
        instr.inputs.clear();
    }

    /// Appends a deoptimization frame to an instruction.
    pub fn push_environment(&mut self, instr: InstructionId, env: Environment) {
        self.instrs
            .get_mut(&instr)
            .expect("instruction belongs to this graph")
            .environments
            .push(env);
    }

    /// Replaces all deoptimization frames of an instruction.
    pub fn set_environments(&mut self, instr: InstructionId, envs: Vec<Environment>) {
        self.instrs
            .get_mut(&instr)
            .expect("instruction belongs to this graph")
            .environments = envs;
    }

    /// Rewrites uses of `old` to `new` across inputs and environment
    /// slots, for every user `filter` accepts.
    pub fn replace_uses_with<F>(&mut self, old: InstructionId, new: InstructionId, filter: F)
    where
        F: Fn(&Instruction) -> bool,
    {
        let users: Vec<InstructionId> = self
            .instrs
            .values()
            .filter(|instr| {
                let uses_old = instr.inputs.contains(&old)
                    || instr
                        .environments
                        .iter()
                        .any(|env| env.slots().contains(&Some(old)));
                uses_old && filter(instr)
            })
            .map(|instr| instr.id)
            .collect();
        for user in users {
            let instr = self.instrs.get_mut(&user).expect("user still present");
            for input in &mut instr.inputs {
                if *input == old {
                    *input = new;
                }
            }
            for env in &mut instr.environments {
                for slot in env.slots_mut() {
                    if *slot == Some(old) {
                        *slot = Some(new);
                    }
                }
            }
        }
    }

    // --- Edges ---

    /// Successor list of a block.
    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        self.succs.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Predecessor list of a block.
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.preds.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single successor, if the block has exactly one.
    pub fn single_successor(&self, block: BlockId) -> Option<BlockId> {
        match self.successors(block) {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Position of `pred` in `block`'s predecessor list, which is also
    /// the phi input index for that edge.
    pub fn pred_index_of(&self, block: BlockId, pred: BlockId) -> Option<usize> {
        self.predecessors(block).iter().position(|&p| p == pred)
    }

    /// Adds an edge. The new predecessor entry goes to the end of the
    /// successor's list, so existing phi input indices are unaffected.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.succs
            .get_mut(&from)
            .expect("edge source belongs to this graph")
            .push(to);
        self.preds
            .get_mut(&to)
            .expect("edge target belongs to this graph")
            .push(from);
    }

    /// Redirects the edge `from -> old_to` to `from -> new_to`.
    ///
    /// `from` is removed from `old_to`'s predecessor list at its index
    /// (shifting later entries down) and appended to `new_to`'s list.
    /// Phi inputs of `old_to` are not touched; the caller removes the
    /// matching input if the block has phis.
    pub fn replace_successor(&mut self, from: BlockId, old_to: BlockId, new_to: BlockId) {
        let succs = self
            .succs
            .get_mut(&from)
            .expect("edge source belongs to this graph");
        let pos = succs
            .iter()
            .position(|&s| s == old_to)
            .expect("edge to replace must exist");
        succs[pos] = new_to;

        let old_preds = self
            .preds
            .get_mut(&old_to)
            .expect("old edge target belongs to this graph");
        let pred_pos = old_preds
            .iter()
            .position(|&p| p == from)
            .expect("symmetric predecessor entry must exist");
        old_preds.remove(pred_pos);

        self.preds
            .get_mut(&new_to)
            .expect("new edge target belongs to this graph")
            .push(from);
    }

    /// Splits every critical edge (multi-successor source to
    /// multi-predecessor target) by inserting a block with a `Goto`.
    ///
    /// Both endpoints keep their adjacency-list positions, so phi
    /// inputs of the targets stay aligned with predecessor indices.
    pub fn simplify_cfg(&mut self) {
        let block_ids: Vec<BlockId> = self.block_ids().collect();
        for from in block_ids {
            if self.successors(from).len() < 2 {
                continue;
            }
            let targets = self.successors(from).to_vec();
            for to in targets {
                if self.predecessors(to).len() < 2 {
                    continue;
                }
                self.split_critical_edge(from, to);
            }
        }
    }

    fn split_critical_edge(&mut self, from: BlockId, to: BlockId) {
        let mid = self.add_block();
        self.append_instruction(mid, InstructionKind::Goto, IrType::Void, Vec::new());

        let succs = self
            .succs
            .get_mut(&from)
            .expect("edge source belongs to this graph");
        let spos = succs
            .iter()
            .position(|&s| s == to)
            .expect("critical edge must exist");
        succs[spos] = mid;

        let preds = self
            .preds
            .get_mut(&to)
            .expect("edge target belongs to this graph");
        let ppos = preds
            .iter()
            .position(|&p| p == from)
            .expect("symmetric predecessor entry must exist");
        preds[ppos] = mid;

        self.succs.get_mut(&mid).expect("fresh block").push(to);
        self.preds.get_mut(&mid).expect("fresh block").push(from);

        // Splitting a back edge moves its source: the header now sees
        // the new block as the predecessor, so the loop's back-edge
        // list and block set follow it.
        let bound = self.block_id_bound();
        if let Some(id) = self.loop_of(to) {
            let info = self.loops.get_mut(&id).expect("recorded loop exists");
            if info.header == to {
                if let Some(pos) = info.back_edges.iter().position(|&b| b == from) {
                    info.back_edges[pos] = mid;
                    info.blocks.grow(bound);
                    info.blocks.insert(mid.index());
                    self.block_loop.insert(mid, id);
                }
            }
        }
    }

    // --- Traversal orders ---

    /// Post-order over the blocks reachable from the entry, by
    /// iterative depth-first search.
    pub fn post_order(&self) -> Vec<BlockId> {
        let mut out = Vec::with_capacity(self.blocks.len());
        if self.blocks.is_empty() {
            return out;
        }
        let mut visited = FixedBitSet::with_capacity(self.block_id_bound());
        visited.insert(self.entry.index());
        let mut stack: Vec<(BlockId, usize)> = vec![(self.entry, 0)];
        loop {
            let (block, next) = match stack.last_mut() {
                Some(frame) => {
                    let state = (frame.0, frame.1);
                    frame.1 += 1;
                    state
                }
                None => break,
            };
            let succs = self.successors(block);
            if next < succs.len() {
                let succ = succs[next];
                if !visited.contains(succ.index()) {
                    visited.insert(succ.index());
                    stack.push((succ, 0));
                }
            } else {
                out.push(block);
                stack.pop();
            }
        }
        out
    }

    /// Reverse post-order over the blocks reachable from the entry.
    /// Every block appears before all of its non-back-edge successors.
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let mut order = self.post_order();
        order.reverse();
        order
    }

    // --- Dominance ---

    /// Computes immediate dominators for all reachable blocks with the
    /// Cooper-Harvey-Kennedy iteration over reverse post-order.
    pub fn compute_dominance(&mut self) {
        self.idom.clear();
        if self.blocks.is_empty() {
            return;
        }
        let rpo = self.reverse_post_order();
        let mut rpo_number: IndexMap<BlockId, usize> = IndexMap::with_capacity(rpo.len());
        for (i, &block) in rpo.iter().enumerate() {
            rpo_number.insert(block, i);
        }
        self.idom.insert(self.entry, self.entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for &pred in self.predecessors(block) {
                    if !self.idom.contains_key(&pred) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => self.intersect(current, pred, &rpo_number),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if self.idom.get(&block) != Some(&new_idom) {
                        self.idom.insert(block, new_idom);
                        changed = true;
                    }
                }
            }
        }
    }

    fn intersect(
        &self,
        mut finger1: BlockId,
        mut finger2: BlockId,
        rpo_number: &IndexMap<BlockId, usize>,
    ) -> BlockId {
        while finger1 != finger2 {
            while rpo_number[&finger1] > rpo_number[&finger2] {
                finger1 = self.idom[&finger1];
            }
            while rpo_number[&finger2] > rpo_number[&finger1] {
                finger2 = self.idom[&finger2];
            }
        }
        finger1
    }

    /// Drops all dominance information.
    pub fn clear_dominance(&mut self) {
        self.idom.clear();
    }

    /// Returns true if dominance has been computed.
    pub fn has_dominance(&self) -> bool {
        !self.idom.is_empty()
    }

    /// The immediate dominator of a block; `None` for the entry and
    /// for unreachable blocks.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied().filter(|&d| d != block)
    }

    /// Returns true if `a` dominates `b`. Requires dominance to be
    /// current. Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        while current != a {
            let Some(&dom) = self.idom.get(&current) else {
                return false;
            };
            if dom == current {
                return false;
            }
            current = dom;
        }
        true
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// entry -> a -> exit
    ///       \> b /
    fn diamond() -> (Graph, BlockId, BlockId, BlockId, BlockId) {
        let mut g = Graph::new();
        let entry = g.add_block();
        let a = g.add_block();
        let b = g.add_block();
        let exit = g.add_block();
        g.add_edge(entry, a);
        g.add_edge(entry, b);
        g.add_edge(a, exit);
        g.add_edge(b, exit);
        (g, entry, a, b, exit)
    }

    // --- Construction Tests ---

    #[test]
    fn test_first_block_is_entry() {
        let mut g = Graph::new();
        let first = g.add_block();
        assert_eq!(g.entry(), first);
        assert_eq!(g.num_blocks(), 1);
        assert_eq!(g.block_id_bound(), 1);
    }

    #[test]
    fn test_adjacency_symmetry() {
        let (g, entry, a, b, exit) = diamond();
        assert_eq!(g.successors(entry), &[a, b]);
        assert_eq!(g.predecessors(exit), &[a, b]);
        assert_eq!(g.predecessors(a), &[entry]);
        assert_eq!(g.single_successor(a), Some(exit));
        assert_eq!(g.single_successor(entry), None);
    }

    #[test]
    fn test_pred_index_of() {
        let (g, _, a, b, exit) = diamond();
        assert_eq!(g.pred_index_of(exit, a), Some(0));
        assert_eq!(g.pred_index_of(exit, b), Some(1));
        assert_eq!(g.pred_index_of(a, exit), None);
    }

    #[test]
    fn test_replace_successor_moves_pred_entry() {
        let (mut g, entry, a, b, exit) = diamond();
        let other = g.add_block();
        g.replace_successor(a, exit, other);
        assert_eq!(g.successors(a), &[other]);
        // a removed at index 0; b shifts down.
        assert_eq!(g.predecessors(exit), &[b]);
        assert_eq!(g.predecessors(other), &[a]);
        assert_eq!(g.successors(entry), &[a, b]);
    }

    // --- Instruction Tests ---

    #[test]
    fn test_append_instruction_sets_block() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let c = g.append_instruction(entry, InstructionKind::IntConstant(1), IrType::Int32, vec![]);
        assert_eq!(g.instruction(c).unwrap().block(), Some(entry));
        assert_eq!(g.block(entry).unwrap().instructions, vec![c]);
    }

    #[test]
    fn test_phi_input_index_ops() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let c0 = g.append_instruction(entry, InstructionKind::IntConstant(0), IrType::Int32, vec![]);
        let c1 = g.append_instruction(entry, InstructionKind::IntConstant(1), IrType::Int32, vec![]);
        let phi = g.new_instruction(InstructionKind::Phi, IrType::Int32, vec![]);
        g.add_phi(entry, phi);
        g.add_phi_input(phi, c0);
        g.add_phi_input(phi, c1);
        assert_eq!(g.instruction(phi).unwrap().inputs, vec![c0, c1]);
        g.remove_phi_input(phi, 0);
        assert_eq!(g.instruction(phi).unwrap().inputs, vec![c1]);
        g.clear_phi_inputs(phi);
        assert!(g.instruction(phi).unwrap().inputs.is_empty());
    }

    #[test]
    fn test_clone_instruction_is_detached() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let c0 = g.append_instruction(entry, InstructionKind::IntConstant(0), IrType::Int32, vec![]);
        let add = g.append_instruction(entry, InstructionKind::Add, IrType::Int32, vec![c0, c0]);
        g.push_environment(add, Environment::new(vec![Some(c0)]));
        let copy = g.clone_instruction(add);
        let copy_instr = g.instruction(copy).unwrap();
        assert_eq!(copy_instr.kind, InstructionKind::Add);
        assert_eq!(copy_instr.inputs, vec![c0, c0]);
        assert_eq!(copy_instr.block(), None);
        assert!(!copy_instr.has_environment());
    }

    #[test]
    fn test_replace_uses_with_filter() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let other = g.add_block();
        let c0 = g.append_instruction(entry, InstructionKind::IntConstant(0), IrType::Int32, vec![]);
        let c1 = g.append_instruction(entry, InstructionKind::IntConstant(1), IrType::Int32, vec![]);
        let use_in_entry =
            g.append_instruction(entry, InstructionKind::Add, IrType::Int32, vec![c0, c0]);
        let use_in_other =
            g.append_instruction(other, InstructionKind::Add, IrType::Int32, vec![c0, c0]);
        g.push_environment(use_in_other, Environment::new(vec![Some(c0), None]));

        g.replace_uses_with(c0, c1, |instr| instr.block() == Some(other));

        assert_eq!(g.instruction(use_in_entry).unwrap().inputs, vec![c0, c0]);
        let rewritten = g.instruction(use_in_other).unwrap();
        assert_eq!(rewritten.inputs, vec![c1, c1]);
        assert_eq!(rewritten.environments[0].slots(), &[Some(c1), None]);
    }

    #[test]
    fn test_remove_phi() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let phi = g.new_instruction(InstructionKind::Phi, IrType::Int32, vec![]);
        g.add_phi(entry, phi);
        g.remove_phi(entry, phi);
        assert!(g.block(entry).unwrap().phis.is_empty());
        assert!(g.instruction(phi).is_none());
    }

    // --- Traversal Tests ---

    #[test]
    fn test_post_order_diamond() {
        let (g, entry, _, _, exit) = diamond();
        let order = g.post_order();
        assert_eq!(order.len(), 4);
        assert_eq!(*order.last().unwrap(), entry);
        assert_eq!(order[0], exit);
    }

    #[test]
    fn test_reverse_post_order_defs_before_uses() {
        let (g, entry, a, b, exit) = diamond();
        let rpo = g.reverse_post_order();
        let pos = |x: BlockId| rpo.iter().position(|&y| y == x).unwrap();
        assert!(pos(entry) < pos(a));
        assert!(pos(entry) < pos(b));
        assert!(pos(a) < pos(exit));
        assert!(pos(b) < pos(exit));
    }

    #[test]
    fn test_post_order_skips_unreachable() {
        let (mut g, ..) = diamond();
        let _island = g.add_block();
        assert_eq!(g.post_order().len(), 4);
    }

    // --- Dominance Tests ---

    #[test]
    fn test_dominance_diamond() {
        let (mut g, entry, a, b, exit) = diamond();
        g.compute_dominance();
        assert!(g.has_dominance());
        assert_eq!(g.immediate_dominator(entry), None);
        assert_eq!(g.immediate_dominator(a), Some(entry));
        assert_eq!(g.immediate_dominator(b), Some(entry));
        assert_eq!(g.immediate_dominator(exit), Some(entry));
        assert!(g.dominates(entry, exit));
        assert!(g.dominates(a, a));
        assert!(!g.dominates(a, exit));
        assert!(!g.dominates(a, b));
    }

    #[test]
    fn test_dominance_with_loop() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let header = g.add_block();
        let body = g.add_block();
        let exit = g.add_block();
        g.add_edge(entry, header);
        g.add_edge(header, exit);
        g.add_edge(header, body);
        g.add_edge(body, header);
        g.compute_dominance();
        assert_eq!(g.immediate_dominator(header), Some(entry));
        assert_eq!(g.immediate_dominator(body), Some(header));
        assert_eq!(g.immediate_dominator(exit), Some(header));
        assert!(g.dominates(header, body));
        assert!(!g.dominates(body, header));
    }

    #[test]
    fn test_clear_dominance() {
        let (mut g, ..) = diamond();
        g.compute_dominance();
        g.clear_dominance();
        assert!(!g.has_dominance());
    }

    // --- simplify_cfg Tests ---

    #[test]
    fn test_split_critical_edges_preserves_pred_index() {
        // entry has two successors; both targets also have a second
        // predecessor (from a single-successor side block), so exactly
        // entry's two edges are critical.
        let mut g = Graph::new();
        let entry = g.add_block();
        let side_l = g.add_block();
        let side_r = g.add_block();
        let left = g.add_block();
        let right = g.add_block();
        g.add_edge(entry, left);
        g.add_edge(entry, right);
        g.add_edge(side_l, left);
        g.add_edge(side_r, right);

        let before = g.num_blocks();
        g.simplify_cfg();
        assert_eq!(g.num_blocks(), before + 2);

        // entry's slots now point at fresh single-purpose blocks.
        for (i, &mid) in g.successors(entry).to_vec().iter().enumerate() {
            assert!(mid.index() >= before);
            let target = if i == 0 { left } else { right };
            assert_eq!(g.successors(mid), &[target]);
            assert_eq!(g.predecessors(mid), &[entry]);
            // The split block took over entry's predecessor slot.
            assert_eq!(g.pred_index_of(target, mid), Some(0));
            // The new block ends in a goto.
            let term = g.block(mid).unwrap().last_instruction().unwrap();
            assert_eq!(g.instruction(term).unwrap().kind, InstructionKind::Goto);
        }
    }

    #[test]
    fn test_split_back_edge_moves_loop_back_edge_source() {
        // The latch has a second, exiting successor, so the back edge
        // body -> header is critical and gets split.
        let mut g = Graph::new();
        let entry = g.add_block();
        let header = g.add_block();
        let body = g.add_block();
        let exit = g.add_block();
        let second_exit = g.add_block();
        g.add_edge(entry, header);
        g.add_edge(header, exit);
        g.add_edge(header, body);
        g.add_edge(body, header);
        g.add_edge(body, second_exit);
        g.build_dominator_tree();

        let id = g.loop_of(header).unwrap();
        assert_eq!(g.loop_info(id).unwrap().back_edges, vec![body]);

        g.simplify_cfg();

        // The fresh block took over as the back-edge source and joined
        // the loop.
        let info = g.loop_info(id).unwrap();
        assert_eq!(info.back_edges.len(), 1);
        let mid = info.back_edges[0];
        assert_ne!(mid, body);
        assert_eq!(g.successors(mid), &[header]);
        assert_eq!(g.predecessors(mid), &[body]);
        assert!(info.contains(mid));
        assert_eq!(g.loop_of(mid), Some(id));
    }

    #[test]
    fn test_simplify_cfg_leaves_non_critical_edges() {
        let (mut g, ..) = diamond();
        let before = g.num_blocks();
        g.simplify_cfg();
        assert_eq!(g.num_blocks(), before);
    }
}
