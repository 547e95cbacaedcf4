// This module gathers the ARM32 (A32) backend model: condition codes, the register banks, the
// per-function arena, the operand and instruction algebras, the control-flow instructions and
// their rewriting passes, text and fixup emission, and the legalization helpers used by
// instruction selection. Construction goes through factory methods on MachineFunction, which
// validate every architectural constraint and return a ConstructionError instead of building an
// unencodable instruction.

//! ARM32 machine instruction model.

pub mod branch;
pub mod cond;
pub mod emit;
pub mod fixup;
pub mod function;
pub mod inst;
pub mod legalize;
pub mod operand;
pub mod registers;

pub use branch::BranchTargets;
pub use cond::Condition;
pub use emit::{dump_function, dump_inst, emit_function, EmitOptions, TextEmitter};
pub use fixup::{emit_ias, Assembler, Fixup, FixupAssembler, FixupKind};
pub use function::{CfgNode, InstId, MachineFunction, NodeId, OperandId, VarId};
pub use inst::{
    CmpLikeOp, FourAddrGprOp, Inst, InstKind, LoadOp, ThreeAddrFpOp, ThreeAddrGprOp,
    TwoAddrGprOp, UnaryFpOp, UnaryGprOp, VcvtVariant,
};
pub use operand::{
    AddrMode, ConstantRelocatable, FlexImm, FlexReg, MemOperand, Operand, OperandKind,
    ShiftKind, Variable, VariableKind,
};
