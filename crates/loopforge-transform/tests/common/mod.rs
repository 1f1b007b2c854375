//! Shared graph fixtures: a method skeleton plus spliceable counted
//! loops over an array.
#![allow(dead_code)]

use loopforge_ir::{
    BlockId, Environment, Graph, InstructionId, InstructionKind, IrType,
};

/// A graph under construction together with the handles the tests
/// keep poking at.
pub struct TestGraph {
    pub graph: Graph,
    pub entry: BlockId,
    pub ret: BlockId,
    pub array: InstructionId,
    pub flag: InstructionId,
    pub c0: InstructionId,
    pub c1: InstructionId,
    pub c128: InstructionId,
}

/// The data-flow handles of one loop built by
/// [`TestGraph::add_loop_data_flow`].
pub struct LoopDataFlow {
    pub phi: InstructionId,
    pub increment: InstructionId,
}

/// Builds the skeleton every test starts from: an entry block holding
/// the array parameter and the constants, falling through to a block
/// with a `return`.
pub fn init_graph() -> TestGraph {
    let mut graph = Graph::new();
    let entry = graph.add_block();
    let ret = graph.add_block();
    graph.add_edge(entry, ret);

    let array = graph.append_instruction(
        entry,
        InstructionKind::Parameter(0),
        IrType::Reference,
        vec![],
    );
    let flag = graph.append_instruction(entry, InstructionKind::Parameter(1), IrType::Bool, vec![]);
    let c0 = graph.append_instruction(entry, InstructionKind::IntConstant(0), IrType::Int32, vec![]);
    let c1 = graph.append_instruction(entry, InstructionKind::IntConstant(1), IrType::Int32, vec![]);
    let c128 =
        graph.append_instruction(entry, InstructionKind::IntConstant(128), IrType::Int32, vec![]);
    graph.append_instruction(entry, InstructionKind::Goto, IrType::Void, vec![]);
    graph.append_instruction(ret, InstructionKind::Return, IrType::Void, vec![]);

    TestGraph {
        graph,
        entry,
        ret,
        array,
        flag,
        c0,
        c1,
        c128,
    }
}

impl TestGraph {
    /// Splices a loop skeleton onto the edge `position -> successor`:
    ///
    /// ```text
    /// position -> pre_header -> header -> successor
    ///                           header <-> body
    /// ```
    ///
    /// Splicing onto a loop's exit edge creates a sibling loop;
    /// splicing onto its back-edge path nests the new loop inside it.
    /// Returns `(pre_header, header, body)`. The header gets no
    /// instructions here; call [`Self::add_loop_data_flow`] to make
    /// the loop well formed.
    pub fn insert_loop(
        &mut self,
        position: BlockId,
        successor: BlockId,
    ) -> (BlockId, BlockId, BlockId) {
        let pre_header = self.graph.add_block();
        let header = self.graph.add_block();
        let body = self.graph.add_block();

        self.graph.replace_successor(position, successor, pre_header);
        self.graph.add_edge(pre_header, header);
        self.graph.add_edge(header, successor);
        self.graph.add_edge(header, body);
        self.graph.add_edge(body, header);
        self.graph
            .append_instruction(pre_header, InstructionKind::Goto, IrType::Void, vec![]);
        (pre_header, header, body)
    }

    /// Fills a loop skeleton with a counted array store:
    ///
    /// ```text
    /// header: i = phi [0, i + 1]
    ///         suspend_check [env: i, 128, array]
    ///         if (i >= 128) exit
    /// body:   a = null_check array   [env]
    ///         l = array_length a
    ///         j = bounds_check i, l  [env]
    ///         v = array_get a, j
    ///         array_set a, j, v + 1
    ///         goto header
    /// ```
    pub fn add_loop_data_flow(&mut self, header: BlockId, body: BlockId) -> LoopDataFlow {
        let c0 = self.c0;
        let c1 = self.c1;
        let c128 = self.c128;
        let array = self.array;
        let g = &mut self.graph;

        let phi = g.new_instruction(InstructionKind::Phi, IrType::Int32, vec![]);
        g.add_phi(header, phi);
        let env_slots = vec![Some(phi), Some(c128), Some(array)];

        let suspend =
            g.append_instruction(header, InstructionKind::SuspendCheck, IrType::Void, vec![]);
        g.push_environment(suspend, Environment::new(env_slots.clone()));
        let cond = g.append_instruction(
            header,
            InstructionKind::GreaterThanOrEqual,
            IrType::Bool,
            vec![phi, c128],
        );
        g.append_instruction(header, InstructionKind::If, IrType::Void, vec![cond]);

        let null_check = g.append_instruction(
            body,
            InstructionKind::NullCheck,
            IrType::Reference,
            vec![array],
        );
        g.push_environment(null_check, Environment::new(env_slots.clone()));
        let length = g.append_instruction(
            body,
            InstructionKind::ArrayLength,
            IrType::Int32,
            vec![null_check],
        );
        let bounds_check = g.append_instruction(
            body,
            InstructionKind::BoundsCheck,
            IrType::Int32,
            vec![phi, length],
        );
        g.push_environment(bounds_check, Environment::new(env_slots));
        let get = g.append_instruction(
            body,
            InstructionKind::ArrayGet,
            IrType::Int32,
            vec![null_check, bounds_check],
        );
        let stored = g.append_instruction(body, InstructionKind::Add, IrType::Int32, vec![get, c1]);
        g.append_instruction(
            body,
            InstructionKind::ArraySet,
            IrType::Void,
            vec![null_check, bounds_check, stored],
        );
        let increment = g.append_instruction(body, InstructionKind::Add, IrType::Int32, vec![phi, c1]);
        g.append_instruction(body, InstructionKind::Goto, IrType::Void, vec![]);

        g.add_phi_input(phi, c0);
        g.add_phi_input(phi, increment);

        LoopDataFlow { phi, increment }
    }

    /// Swaps the return block's `return` for `return_value value`.
    pub fn make_return_value(&mut self, value: InstructionId) {
        let ret = self.ret;
        let old = self
            .graph
            .block_mut(ret)
            .expect("return block exists")
            .instructions
            .pop()
            .expect("return block has a terminator");
        self.graph.instruction_mut(old).expect("terminator exists").block = None;
        self.graph.append_instruction(
            ret,
            InstructionKind::ReturnValue,
            IrType::Int32,
            vec![value],
        );
    }
}

/// Runs the structural checker and panics with its messages on
/// failure.
pub fn assert_graph_valid(graph: &Graph) {
    let mut checker = loopforge_ir::GraphChecker::new(graph);
    checker.run();
    assert!(
        checker.is_valid(),
        "graph checker errors: {:#?}",
        checker.errors()
    );
}
