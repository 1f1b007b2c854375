//! Instructions, value types, and deoptimization environments.

use crate::BlockId;
use std::fmt;

/// Unique identifier for an instruction within a graph.
///
/// Like block ids, instruction ids are assigned monotonically and
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionId(pub u32);

impl InstructionId {
    /// Creates a new instruction id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the id as a bit-set index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Value type of an instruction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IrType {
    Bool,
    Int32,
    Int64,
    Reference,
    Void,
}

/// Instruction opcodes.
///
/// The set is deliberately small: enough to express counted loops over
/// arrays, which is what the loop transforms operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstructionKind {
    /// Integer constant.
    IntConstant(i64),
    /// Method parameter, by position.
    Parameter(u32),
    /// SSA phi; inputs are kept in lockstep with the block's
    /// predecessor list.
    Phi,
    /// Integer addition.
    Add,
    /// Integer comparison producing a `Bool`.
    GreaterThanOrEqual,
    /// Conditional branch on input 0; successor 0 is the true target.
    If,
    /// Unconditional branch to the single successor.
    Goto,
    /// Return without a value.
    Return,
    /// Return input 0.
    ReturnValue,
    /// Deoptimizing null check on input 0; passes the value through.
    NullCheck,
    /// Length of the array in input 0.
    ArrayLength,
    /// Deoptimizing bounds check of index (input 0) against length
    /// (input 1); passes the index through.
    BoundsCheck,
    /// Load from array (input 0) at index (input 1).
    ArrayGet,
    /// Store value (input 2) to array (input 0) at index (input 1).
    ArraySet,
    /// Safepoint poll; carries an environment.
    SuspendCheck,
    /// Class resolution, by type index. Entry-block-bound and not
    /// clonable.
    LoadClass(u32),
}

impl InstructionKind {
    /// Returns a short mnemonic for display and DOT labels.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstructionKind::IntConstant(_) => "const",
            InstructionKind::Parameter(_) => "param",
            InstructionKind::Phi => "phi",
            InstructionKind::Add => "add",
            InstructionKind::GreaterThanOrEqual => "ge",
            InstructionKind::If => "if",
            InstructionKind::Goto => "goto",
            InstructionKind::Return => "return",
            InstructionKind::ReturnValue => "return_value",
            InstructionKind::NullCheck => "null_check",
            InstructionKind::ArrayLength => "array_length",
            InstructionKind::BoundsCheck => "bounds_check",
            InstructionKind::ArrayGet => "array_get",
            InstructionKind::ArraySet => "array_set",
            InstructionKind::SuspendCheck => "suspend_check",
            InstructionKind::LoadClass(_) => "load_class",
        }
    }

    /// Returns true if the loop transforms may duplicate this
    /// instruction.
    pub fn is_clonable(&self) -> bool {
        !matches!(self, InstructionKind::LoadClass(_))
    }

    /// Returns true if this instruction ends a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionKind::If
                | InstructionKind::Goto
                | InstructionKind::Return
                | InstructionKind::ReturnValue
        )
    }

    /// For terminators, the number of successors the containing block
    /// must have.
    pub fn successor_arity(&self) -> Option<usize> {
        match self {
            InstructionKind::If => Some(2),
            InstructionKind::Goto => Some(1),
            InstructionKind::Return | InstructionKind::ReturnValue => Some(0),
            _ => None,
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionKind::IntConstant(v) => write!(f, "const {v}"),
            InstructionKind::Parameter(n) => write!(f, "param {n}"),
            InstructionKind::LoadClass(idx) => write!(f, "load_class {idx}"),
            other => f.write_str(other.mnemonic()),
        }
    }
}

/// One deoptimization frame: the values of the interpreter-visible
/// slots at the instruction's position. `None` marks a dead slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Environment {
    slots: Vec<Option<InstructionId>>,
}

impl Environment {
    /// Creates a frame from slot values.
    pub fn new(slots: Vec<Option<InstructionId>>) -> Self {
        Self { slots }
    }

    /// Number of slots in the frame.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the frame has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot values.
    pub fn slots(&self) -> &[Option<InstructionId>] {
        &self.slots
    }

    /// Mutable access to the slot values.
    pub fn slots_mut(&mut self) -> &mut [Option<InstructionId>] {
        &mut self.slots
    }
}

/// An SSA instruction.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// This instruction's id.
    pub id: InstructionId,
    /// Opcode.
    pub kind: InstructionKind,
    /// Result type.
    pub ty: IrType,
    /// Value inputs. For phis, input `i` corresponds to predecessor
    /// `i` of the containing block.
    pub inputs: Vec<InstructionId>,
    /// The block this instruction lives in, once inserted.
    pub block: Option<BlockId>,
    /// Deoptimization frames, outermost first. Empty for instructions
    /// that cannot deoptimize.
    pub environments: Vec<Environment>,
}

impl Instruction {
    /// Creates a detached instruction.
    pub fn new(id: InstructionId, kind: InstructionKind, ty: IrType, inputs: Vec<InstructionId>) -> Self {
        Self {
            id,
            kind,
            ty,
            inputs,
            block: None,
            environments: Vec::new(),
        }
    }

    /// The containing block, if inserted.
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    /// Number of value inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Returns true if the instruction carries at least one
    /// deoptimization frame.
    pub fn has_environment(&self) -> bool {
        !self.environments.is_empty()
    }

    /// Returns true if this is a phi.
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, InstructionKind::Phi)
    }
}
