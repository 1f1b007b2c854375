//! Natural-loop information and loop analysis.
//!
//! Loops are discovered from retreating edges of a depth-first walk
//! and populated by walking predecessors backwards from each back
//! edge. Membership is innermost-wins: a block's recorded loop is the
//! most deeply nested one containing it, and outer loops absorb inner
//! block sets afterwards.

use crate::{BlockId, Error, Graph};
use fixedbitset::FixedBitSet;
use std::fmt;

/// Unique identifier for a loop within a graph.
///
/// A loop keeps its id as long as its header stays a header, so
/// callers may hold loop ids across transformations that re-run the
/// analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoopId(pub u32);

impl LoopId {
    /// Creates a new loop id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop{}", self.0)
    }
}

/// Information about one natural loop.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoopInfo {
    /// The loop header.
    pub header: BlockId,
    /// Sources of edges into the header from inside the loop.
    pub back_edges: Vec<BlockId>,
    /// All member blocks, header included, indexed by block id.
    pub blocks: FixedBitSet,
    /// True if the loop can be entered other than through its header.
    pub irreducible: bool,
}

impl LoopInfo {
    /// Creates an empty loop rooted at `header`.
    pub fn new(header: BlockId, block_id_bound: usize) -> Self {
        Self {
            header,
            back_edges: Vec::new(),
            blocks: FixedBitSet::with_capacity(block_id_bound),
            irreducible: false,
        }
    }

    /// Returns true if `block` belongs to the loop.
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(block.index())
    }

    /// Number of back edges.
    pub fn num_back_edges(&self) -> usize {
        self.back_edges.len()
    }
}

impl Graph {
    /// The innermost loop containing `block`, if any.
    pub fn loop_of(&self, block: BlockId) -> Option<LoopId> {
        self.block_loop.get(&block).copied()
    }

    /// Looks up loop information.
    pub fn loop_info(&self, id: LoopId) -> Option<&LoopInfo> {
        self.loops.get(&id)
    }

    /// Looks up loop information mutably.
    pub fn loop_info_mut(&mut self, id: LoopId) -> Option<&mut LoopInfo> {
        self.loops.get_mut(&id)
    }

    /// Sets or clears the innermost loop recorded for a block.
    pub fn set_innermost_loop(&mut self, block: BlockId, loop_id: Option<LoopId>) {
        match loop_id {
            Some(id) => {
                self.block_loop.insert(block, id);
            }
            None => {
                self.block_loop.shift_remove(&block);
            }
        }
    }

    /// Iterates over the loops that are current: their header still
    /// records them as its innermost loop and they have back edges.
    pub fn live_loop_ids(&self) -> impl Iterator<Item = LoopId> + '_ {
        self.loops.iter().filter_map(|(&id, info)| {
            let live = self.block_loop.get(&info.header) == Some(&id)
                && !info.back_edges.is_empty();
            live.then_some(id)
        })
    }

    /// Returns true if `block` heads a loop.
    pub fn is_loop_header(&self, block: BlockId) -> bool {
        match self.loop_of(block) {
            Some(id) => self.loops[&id].header == block,
            None => false,
        }
    }

    /// Returns true if any current loop is irreducible.
    pub fn has_irreducible_loops(&self) -> bool {
        self.live_loop_ids().any(|id| self.loops[&id].irreducible)
    }

    /// Returns true if `inner` is nested in (or equal to) `outer`:
    /// `outer`'s block set contains `inner`'s header.
    pub fn is_loop_in(&self, inner: LoopId, outer: LoopId) -> bool {
        let header = self.loops[&inner].header;
        self.loops[&outer].contains(header)
    }

    /// The pre-header: the first predecessor of the header that is not
    /// a back-edge source. After analysis orders header predecessors,
    /// this is predecessor 0.
    pub fn pre_header(&self, id: LoopId) -> Result<BlockId, Error> {
        let info = self.loops.get(&id).ok_or(Error::UnknownLoop(id))?;
        self.predecessors(info.header)
            .iter()
            .copied()
            .find(|pred| !info.back_edges.contains(pred))
            .ok_or(Error::NoPreHeader(id))
    }

    /// The loop immediately enclosing `id`, derived from the loop of
    /// its pre-header.
    pub fn outer_loop_of(&self, id: LoopId) -> Option<LoopId> {
        let pre_header = self.pre_header(id).ok()?;
        let outer = self.loop_of(pre_header)?;
        (outer != id).then_some(outer)
    }

    /// Clears a loop's derived state (block set, back edges,
    /// irreducibility) while keeping its identity and header.
    pub fn reset_loop_block_data(&mut self, id: LoopId) {
        if let Some(info) = self.loops.get_mut(&id) {
            info.back_edges.clear();
            info.blocks.clear();
            info.irreducible = false;
        }
    }

    /// Records `source -> target` as a back edge of the loop headed by
    /// `target`, creating the loop if the header does not currently
    /// head one. An existing loop of the same header is reused so loop
    /// identity survives re-analysis.
    pub fn add_back_edge_while_updating(&mut self, target: BlockId, source: BlockId) {
        let loop_id = match self.block_loop.get(&target).copied() {
            Some(id) if self.loops[&id].header == target => id,
            _ => {
                let id = LoopId::new(self.next_loop_id);
                self.next_loop_id += 1;
                self.loops
                    .insert(id, LoopInfo::new(target, self.block_id_bound()));
                self.block_loop.insert(target, id);
                id
            }
        };
        let info = self.loops.get_mut(&loop_id).expect("loop just resolved");
        if !info.back_edges.contains(&source) {
            info.back_edges.push(source);
        }
    }

    /// Finds retreating edges by iterative depth-first search from
    /// `entry`, restricted to the blocks in `local_set`, and records
    /// each as a back edge via [`add_back_edge_while_updating`].
    ///
    /// [`add_back_edge_while_updating`]: Graph::add_back_edge_while_updating
    pub fn find_back_edges_in(&mut self, entry: BlockId, local_set: &FixedBitSet) {
        let bound = self.block_id_bound();
        let mut visited = FixedBitSet::with_capacity(bound);
        let mut visiting = FixedBitSet::with_capacity(bound);
        let mut successors_visited = vec![0usize; bound];
        let mut worklist: Vec<BlockId> = Vec::new();

        visited.insert(entry.index());
        visiting.insert(entry.index());
        worklist.push(entry);

        loop {
            let Some(&current) = worklist.last() else {
                break;
            };
            let index = current.index();
            if successors_visited[index] == self.successors(current).len() {
                visiting.remove(index);
                worklist.pop();
                continue;
            }
            let successor = self.successors(current)[successors_visited[index]];
            successors_visited[index] += 1;
            if !local_set.contains(successor.index()) {
                continue;
            }
            if visiting.contains(successor.index()) {
                self.add_back_edge_while_updating(successor, current);
            } else if !visited.contains(successor.index()) {
                visited.insert(successor.index());
                visiting.insert(successor.index());
                worklist.push(successor);
            }
        }
    }

    /// Fills in a loop's block set by walking predecessors backwards
    /// from each back edge until the header, records innermost-loop
    /// membership for every member, and flags the loop irreducible if
    /// the header does not dominate some member. Dominance must be
    /// current.
    pub fn populate_loop(&mut self, id: LoopId) {
        let (header, back_edges) = {
            let info = &self.loops[&id];
            (info.header, info.back_edges.clone())
        };
        let mut blocks = FixedBitSet::with_capacity(self.block_id_bound());
        blocks.insert(header.index());
        let mut members = vec![header];
        let mut stack = back_edges;
        while let Some(block) = stack.pop() {
            if blocks.contains(block.index()) {
                continue;
            }
            blocks.insert(block.index());
            members.push(block);
            for &pred in self.predecessors(block) {
                if !blocks.contains(pred.index()) {
                    stack.push(pred);
                }
            }
        }

        for &block in &members {
            self.set_in_loop(block, id);
        }
        let irreducible = members.iter().any(|&block| !self.dominates(header, block));
        let info = self.loops.get_mut(&id).expect("loop exists");
        info.blocks = blocks;
        info.irreducible = irreducible;
    }

    /// Innermost-wins membership update: the block keeps its current
    /// loop if that loop is nested in `id` or the block heads it.
    fn set_in_loop(&mut self, block: BlockId, id: LoopId) {
        match self.block_loop.get(&block).copied() {
            None => {
                self.block_loop.insert(block, id);
            }
            Some(current) => {
                if current == id || self.loops[&current].header == block {
                    return;
                }
                let new_header = self.loops[&id].header;
                if self.loops[&current].contains(new_header) {
                    // `id` is nested inside the recorded loop.
                    self.block_loop.insert(block, id);
                }
            }
        }
    }

    /// Adds `inner`'s block set to `outer` and to every loop enclosing
    /// `outer`, so outer loops contain all blocks of their inner loops.
    pub fn populate_inner_loop_upwards(&mut self, outer: LoopId, inner: LoopId) {
        let mut inner = inner;
        let mut current = Some(outer);
        while let Some(outer_id) = current {
            let mut inner_blocks = self.loops[&inner].blocks.clone();
            let info = self.loops.get_mut(&outer_id).expect("loop exists");
            let len = inner_blocks.len().max(info.blocks.len());
            inner_blocks.grow(len);
            info.blocks.grow(len);
            info.blocks.union_with(&inner_blocks);
            inner = outer_id;
            current = self.outer_loop_of(outer_id);
        }
    }

    /// Populates every loop headed inside `local_set`, innermost first
    /// (post order), then propagates inner block sets upwards.
    /// Dominance must be current.
    pub fn analyze_loops_in(&mut self, local_set: &FixedBitSet) {
        let order = self.post_order();
        for &block in &order {
            if local_set.contains(block.index()) && self.is_loop_header(block) {
                let id = self.loop_of(block).expect("headers record their loop");
                self.populate_loop(id);
            }
        }
        for &block in &order {
            if local_set.contains(block.index()) && self.is_loop_header(block) {
                let id = self.loop_of(block).expect("headers record their loop");
                if let Some(outer) = self.outer_loop_of(id) {
                    self.populate_inner_loop_upwards(outer, id);
                }
            }
        }
    }

    /// Moves back-edge predecessors of a loop header after all other
    /// predecessors, permuting the header's phi inputs in lockstep.
    pub fn order_loop_header_predecessors(&mut self, header: BlockId) {
        let Some(id) = self.loop_of(header) else {
            return;
        };
        if self.loops[&id].header != header {
            return;
        }
        let back_edges = self.loops[&id].back_edges.clone();
        let preds = self.predecessors(header).to_vec();
        let mut perm: Vec<usize> = (0..preds.len()).collect();
        perm.sort_by_key(|&i| back_edges.contains(&preds[i]));
        if perm.iter().enumerate().all(|(i, &p)| i == p) {
            return;
        }
        let new_preds: Vec<BlockId> = perm.iter().map(|&i| preds[i]).collect();
        *self.preds.get_mut(&header).expect("header exists") = new_preds;
        for phi in self.blocks[&header].phis.clone() {
            let instr = self.instrs.get_mut(&phi).expect("phi exists");
            let inputs = instr.inputs.clone();
            debug_assert_eq!(inputs.len(), perm.len());
            instr.inputs = perm.iter().map(|&i| inputs[i]).collect();
        }
    }

    /// Full analysis from scratch: discards all loop state, finds back
    /// edges, computes dominance, populates loops, and orders loop
    /// header predecessors (back edges last).
    pub fn build_dominator_tree(&mut self) {
        self.loops.clear();
        self.block_loop.clear();

        let mut all = FixedBitSet::with_capacity(self.block_id_bound());
        for block in self.block_ids().collect::<Vec<_>>() {
            all.insert(block.index());
        }
        self.find_back_edges_in(self.entry(), &all);
        self.clear_dominance();
        self.compute_dominance();
        self.analyze_loops_in(&all);
        for block in self.post_order() {
            if self.is_loop_header(block) {
                self.order_loop_header_predecessors(block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstructionKind, IrType};

    /// entry -> header -> {exit, body}; body -> header.
    fn simple_loop() -> (Graph, BlockId, BlockId, BlockId, BlockId) {
        let mut g = Graph::new();
        let entry = g.add_block();
        let header = g.add_block();
        let body = g.add_block();
        let exit = g.add_block();
        g.add_edge(entry, header);
        g.add_edge(header, exit);
        g.add_edge(header, body);
        g.add_edge(body, header);
        (g, entry, header, body, exit)
    }

    // --- Discovery Tests ---

    #[test]
    fn test_simple_loop_discovery() {
        let (mut g, entry, header, body, exit) = simple_loop();
        g.build_dominator_tree();

        let id = g.loop_of(header).expect("loop found");
        let info = g.loop_info(id).unwrap();
        assert_eq!(info.header, header);
        assert_eq!(info.back_edges, vec![body]);
        assert!(info.contains(header));
        assert!(info.contains(body));
        assert!(!info.contains(entry));
        assert!(!info.contains(exit));
        assert!(!info.irreducible);

        assert!(g.is_loop_header(header));
        assert!(!g.is_loop_header(body));
        assert_eq!(g.loop_of(body), Some(id));
        assert_eq!(g.loop_of(entry), None);
        assert_eq!(g.pre_header(id), Ok(entry));
        assert_eq!(g.outer_loop_of(id), None);
        assert_eq!(g.live_loop_ids().collect::<Vec<_>>(), vec![id]);
    }

    #[test]
    fn test_nested_loops() {
        // entry -> h1 -> {exit, h2}; h2 -> {latch1, b2};
        // b2 -> h2; latch1 -> h1.
        let mut g = Graph::new();
        let entry = g.add_block();
        let h1 = g.add_block();
        let h2 = g.add_block();
        let latch1 = g.add_block();
        let b2 = g.add_block();
        let exit = g.add_block();
        g.add_edge(entry, h1);
        g.add_edge(h1, exit);
        g.add_edge(h1, h2);
        g.add_edge(h2, latch1);
        g.add_edge(h2, b2);
        g.add_edge(b2, h2);
        g.add_edge(latch1, h1);
        g.build_dominator_tree();

        let l1 = g.loop_of(h1).unwrap();
        let l2 = g.loop_of(h2).unwrap();
        assert_ne!(l1, l2);

        // Innermost-wins membership.
        assert_eq!(g.loop_of(b2), Some(l2));
        assert_eq!(g.loop_of(latch1), Some(l1));

        // Outer loop absorbed the inner block set.
        let info1 = g.loop_info(l1).unwrap();
        for b in [h1, h2, latch1, b2] {
            assert!(info1.contains(b));
        }
        let info2 = g.loop_info(l2).unwrap();
        assert!(info2.contains(h2));
        assert!(info2.contains(b2));
        assert!(!info2.contains(latch1));

        assert!(g.is_loop_in(l2, l1));
        assert!(!g.is_loop_in(l1, l2));
        assert_eq!(g.outer_loop_of(l2), Some(l1));
        assert_eq!(g.outer_loop_of(l1), None);
        assert_eq!(g.pre_header(l2), Ok(h1));
    }

    #[test]
    fn test_irreducible_loop_flagged() {
        // Two-way entry into the a <-> b cycle.
        let mut g = Graph::new();
        let entry = g.add_block();
        let a = g.add_block();
        let b = g.add_block();
        g.add_edge(entry, a);
        g.add_edge(entry, b);
        g.add_edge(a, b);
        g.add_edge(b, a);
        g.build_dominator_tree();

        assert!(g.has_irreducible_loops());
    }

    #[test]
    fn test_multiple_back_edges_single_loop() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let header = g.add_block();
        let body = g.add_block();
        let latch_a = g.add_block();
        let latch_b = g.add_block();
        g.add_edge(entry, header);
        g.add_edge(header, body);
        g.add_edge(body, latch_a);
        g.add_edge(body, latch_b);
        g.add_edge(latch_a, header);
        g.add_edge(latch_b, header);
        g.build_dominator_tree();

        let id = g.loop_of(header).unwrap();
        let info = g.loop_info(id).unwrap();
        assert_eq!(info.num_back_edges(), 2);
        assert!(info.back_edges.contains(&latch_a));
        assert!(info.back_edges.contains(&latch_b));
    }

    // --- Header predecessor ordering Tests ---

    #[test]
    fn test_order_loop_header_predecessors_permutes_phis() {
        let mut g = Graph::new();
        let entry = g.add_block();
        let header = g.add_block();
        let body = g.add_block();
        g.add_edge(header, body);
        // Back edge recorded before the entry edge, so the header's
        // predecessor list starts out back-edge-first.
        g.add_edge(body, header);
        g.add_edge(entry, header);

        let c0 = g.append_instruction(entry, InstructionKind::IntConstant(0), IrType::Int32, vec![]);
        let c1 = g.append_instruction(entry, InstructionKind::IntConstant(1), IrType::Int32, vec![]);
        let phi = g.new_instruction(InstructionKind::Phi, IrType::Int32, vec![]);
        g.add_phi(header, phi);
        g.add_phi_input(phi, c1); // from body
        g.add_phi_input(phi, c0); // from entry
        assert_eq!(g.predecessors(header), &[body, entry]);

        g.build_dominator_tree();

        assert_eq!(g.predecessors(header), &[entry, body]);
        assert_eq!(g.instruction(phi).unwrap().inputs, vec![c0, c1]);
        let id = g.loop_of(header).unwrap();
        assert_eq!(g.pre_header(id), Ok(entry));
    }

    // --- Re-analysis Tests ---

    #[test]
    fn test_loop_identity_survives_reanalysis() {
        let (mut g, _, header, _, _) = simple_loop();
        g.build_dominator_tree();
        let id = g.loop_of(header).unwrap();

        // Local re-analysis path: reset, re-find, re-populate.
        g.reset_loop_block_data(id);
        let mut all = FixedBitSet::with_capacity(g.block_id_bound());
        for b in g.block_ids().collect::<Vec<_>>() {
            all.insert(b.index());
        }
        g.find_back_edges_in(g.entry(), &all);
        g.clear_dominance();
        g.compute_dominance();
        g.analyze_loops_in(&all);

        assert_eq!(g.loop_of(header), Some(id));
        let info = g.loop_info(id).unwrap();
        assert_eq!(info.header, header);
        assert_eq!(info.num_back_edges(), 1);
    }

    #[test]
    fn test_reset_loop_block_data() {
        let (mut g, _, header, _, _) = simple_loop();
        g.build_dominator_tree();
        let id = g.loop_of(header).unwrap();
        g.reset_loop_block_data(id);
        let info = g.loop_info(id).unwrap();
        assert!(info.back_edges.is_empty());
        assert_eq!(info.blocks.count_ones(..), 0);
        assert!(!info.irreducible);
    }
}
