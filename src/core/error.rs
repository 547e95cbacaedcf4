// This module defines the error types of the ARM32 instruction model using the thiserror crate.
// ConstructionError covers every contract violation a factory can detect while building an
// operand or an instruction: memory operands with both or neither of an index register and an
// immediate offset, non-integer or out-of-range offsets, offsets whose sign disagrees with the
// addressing mode, illegal shift amounts, unencodable flexible immediates, operands of the wrong
// register class, aliasing registers of umull and strex, and predicates attached to instructions that
// cannot be predicated. EmitError covers problems found while emitting a finished instruction
// stream (variables with neither a register nor a stack slot, duplicated register lists, labels
// that were never bound). BuildResult<T> and EmitResult<T> are the convenience aliases used
// throughout the crate. Construction errors are programmer errors in the calling pass; they are
// reported instead of being coerced so that no incorrect machine code is ever produced.

//! Error types for the ARM32 instruction model.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

use crate::arm32::cond::Condition;
use crate::arm32::operand::ShiftKind;
use crate::arm32::function::{InstId, NodeId, OperandId, VarId};
use crate::core::types::Type;

/// Contract violations detected while constructing operands and instructions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("memory operand has both an index register and an immediate offset")]
    MemOffsetAndIndex,

    #[error("memory operand has neither an index register nor an immediate offset")]
    MemMissingAddress,

    #[error("memory operand offset {operand:?} is not a plain 32-bit integer constant")]
    MemOffsetNotInteger { operand: OperandId },

    #[error("offset {offset} cannot be encoded for a {ty} access")]
    MemOffsetOutOfRange { ty: Type, offset: i32 },

    #[error("offset {offset} does not match the sign of the addressing mode")]
    MemOffsetSignMismatch { offset: i32 },

    #[error("immediate-offset memory operands cannot carry a shift")]
    MemShiftWithoutIndex,

    #[error("{ty} accesses have no register-index addressing form")]
    MemIndexNotAllowed { ty: Type },

    #[error("shift amount {amount} is out of range for {kind}")]
    ShiftAmountOutOfRange { kind: ShiftKind, amount: u32 },

    #[error("{kind} requires a shift amount")]
    ShiftAmountMissing { kind: ShiftKind },

    #[error("shift amount {operand:?} must be an integer constant or a general register")]
    ShiftAmountInvalid { operand: OperandId },

    #[error("flexible immediate {value:#x} ror {rotate} is not encodable")]
    FlexImmOutOfRange { value: u32, rotate: u32 },

    #[error("{var:?} of type {ty} is not a general-purpose register operand")]
    NotGprOperand { var: VarId, ty: Type },

    #[error("{var:?} of type {ty} is not a floating-point or vector register operand")]
    NotFpOperand { var: VarId, ty: Type },

    #[error("operand {operand:?} is not valid for {what}")]
    InvalidOperand { operand: OperandId, what: &'static str },

    #[error("operands that must be distinct registers alias")]
    AliasingOperands,

    #[error("mov cannot have both a split destination and a split source")]
    MovMultiDestAndSource,

    #[error("condition {cond:?} is not allowed here")]
    InvalidCondition { cond: Condition },

    #[error("{inst:?} cannot be predicated")]
    NotPredicable { inst: InstId },

    #[error("{inst:?} is not a label")]
    NotALabel { inst: InstId },

    #[error("{inst:?} is not a branch")]
    NotABranch { inst: InstId },

    #[error("stack adjustment of {amount} bytes does not match its operand {operand:?}")]
    StackAmountMismatch { amount: u32, operand: OperandId },

    #[error("register list is empty")]
    EmptyRegisterList,

    #[error("{var:?} has no stack slot")]
    NoStackSlot { var: VarId },

    #[error("auxiliary base register must differ from the frame register")]
    BaseRegisterIsFrameRegister,

    #[error("unknown block {node:?}")]
    UnknownNode { node: NodeId },
}

/// Problems found while emitting a finished instruction stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("{var:?} has neither a register nor a stack slot")]
    UnallocatedVariable { var: VarId },

    #[error("register {reg} appears twice in a register list")]
    DuplicateRegister { reg: String },

    #[error("local label {number} was never bound")]
    UnboundLabel { number: u32 },

    #[error("branch target {node:?} was never bound to an offset")]
    UnboundBlock { node: NodeId },

    #[error("formatting failed")]
    Format(#[from] std::fmt::Error),
}

/// Result type alias for operand and instruction construction.
pub type BuildResult<T> = Result<T, ConstructionError>;

/// Result type alias for emission.
pub type EmitResult<T> = Result<T, EmitError>;
