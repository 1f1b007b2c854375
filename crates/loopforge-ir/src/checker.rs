//! Structural validation of a graph.
//!
//! The checker accumulates human-readable error strings instead of
//! failing fast, so a broken graph reports everything wrong with it in
//! one run.

use crate::{Graph, InstructionKind};

/// Validates the structural invariants of a [`Graph`].
pub struct GraphChecker<'g> {
    graph: &'g Graph,
    errors: Vec<String>,
}

impl<'g> GraphChecker<'g> {
    /// Creates a checker for `graph`.
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            errors: Vec::new(),
        }
    }

    /// Returns true if the last [`run`] found no errors.
    ///
    /// [`run`]: GraphChecker::run
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The accumulated error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Runs all checks.
    pub fn run(&mut self) {
        self.check_adjacency_symmetry();
        for block in self.graph.block_ids().collect::<Vec<_>>() {
            self.check_block(block);
        }
        self.check_instructions();
        self.check_loops();
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn check_adjacency_symmetry(&mut self) {
        for block in self.graph.block_ids().collect::<Vec<_>>() {
            for &succ in self.graph.successors(block) {
                let forward = self
                    .graph
                    .successors(block)
                    .iter()
                    .filter(|&&s| s == succ)
                    .count();
                let backward = self
                    .graph
                    .predecessors(succ)
                    .iter()
                    .filter(|&&p| p == block)
                    .count();
                if forward != backward {
                    self.error(format!(
                        "edge {block} -> {succ} recorded {forward} time(s) forward \
                         but {backward} time(s) backward"
                    ));
                }
            }
            for &pred in self.graph.predecessors(block) {
                if !self.graph.successors(pred).contains(&block) {
                    self.error(format!(
                        "{block} lists predecessor {pred}, which does not list it \
                         as a successor"
                    ));
                }
            }
        }
    }

    fn check_block(&mut self, block: crate::BlockId) {
        let Some(data) = self.graph.block(block) else {
            return;
        };
        let pred_count = self.graph.predecessors(block).len();
        let succ_count = self.graph.successors(block).len();

        for &phi in &data.phis {
            let Some(instr) = self.graph.instruction(phi) else {
                self.error(format!("{block} lists unknown phi {phi}"));
                continue;
            };
            if !instr.is_phi() {
                self.error(format!("{phi} in {block}'s phi list is not a phi"));
            }
            if instr.block() != Some(block) {
                self.error(format!("{phi} in {block} records a different block"));
            }
            if instr.input_count() != pred_count {
                self.error(format!(
                    "{phi} in {block} has {} input(s) but the block has \
                     {pred_count} predecessor(s)",
                    instr.input_count()
                ));
            }
        }

        for (i, &id) in data.instructions.iter().enumerate() {
            let Some(instr) = self.graph.instruction(id) else {
                self.error(format!("{block} lists unknown instruction {id}"));
                continue;
            };
            if instr.is_phi() {
                self.error(format!("{id} is a phi in {block}'s instruction list"));
            }
            if instr.block() != Some(block) {
                self.error(format!("{id} in {block} records a different block"));
            }
            let is_last = i + 1 == data.instructions.len();
            if is_last {
                match instr.kind.successor_arity() {
                    Some(arity) => {
                        if arity != succ_count {
                            self.error(format!(
                                "{block} ends in {} expecting {arity} successor(s) \
                                 but has {succ_count}",
                                instr.kind.mnemonic()
                            ));
                        }
                    }
                    None => {
                        self.error(format!(
                            "{block} ends in non-terminator {}",
                            instr.kind.mnemonic()
                        ));
                    }
                }
            } else if instr.kind.is_terminator() {
                self.error(format!(
                    "{block} has terminator {} before the end of the block",
                    instr.kind.mnemonic()
                ));
            }
        }

        if data.instructions.is_empty() {
            self.error(format!("{block} has no terminator"));
        }
    }

    fn check_instructions(&mut self) {
        let mut missing = Vec::new();
        for instr in self.graph.instructions() {
            for &input in &instr.inputs {
                if self.graph.instruction(input).is_none() {
                    missing.push(format!("{} uses unknown input {input}", instr.id));
                }
            }
            for env in &instr.environments {
                for slot in env.slots().iter().flatten() {
                    if self.graph.instruction(*slot).is_none() {
                        missing.push(format!(
                            "{} holds unknown value {slot} in an environment",
                            instr.id
                        ));
                    }
                }
            }
            if matches!(instr.kind, InstructionKind::Phi) {
                if let Some(block) = instr.block() {
                    if let Some(data) = self.graph.block(block) {
                        if !data.phis.contains(&instr.id) {
                            missing.push(format!(
                                "phi {} is not in {block}'s phi list",
                                instr.id
                            ));
                        }
                    }
                }
            }
        }
        for message in missing {
            self.error(message);
        }
    }

    fn check_loops(&mut self) {
        for id in self.graph.live_loop_ids().collect::<Vec<_>>() {
            let info = self.graph.loop_info(id).expect("live loop exists");
            let header = info.header;
            if !info.contains(header) {
                self.error(format!("{id} does not contain its header {header}"));
            }
            if self.graph.loop_of(header) != Some(id) {
                self.error(format!(
                    "header {header} does not record {id} as its innermost loop"
                ));
            }
            for &back_edge in &info.back_edges {
                if !info.contains(back_edge) {
                    self.error(format!(
                        "{id} back edge source {back_edge} is outside the loop"
                    ));
                }
                if !self.graph.successors(back_edge).contains(&header) {
                    self.error(format!(
                        "{id} back edge source {back_edge} has no edge to header {header}"
                    ));
                }
            }
        }
    }
}
