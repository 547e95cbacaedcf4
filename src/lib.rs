//! TPDE ARM32 - machine instruction model for the A32 backend.
//!
//! This crate models ARM32 machine instructions and operands after
//! instruction selection: memory operands in every A32 addressing mode,
//! rotated-immediate and shifted-register flexible operands, the regular
//! instruction shapes and the irregular multi-part instructions, labels and
//! branches with their rewriting passes, and text/fixup emission.
//!
//! # Primary Usage
//!
//! ```
//! use bumpalo::Bump;
//! use tpde_arm32::arm32::{registers, Condition, EmitOptions, MachineFunction, ThreeAddrGprOp};
//! use tpde_arm32::core::{CompilationSession, Type};
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let mut func = MachineFunction::new(&session, "add_one");
//! let entry = func.make_node("entry");
//! let r0 = func.make_reg_variable(Type::I32, registers::R0);
//! let one = func.flex_for_constant(entry, Type::I32, 1)?;
//! let add = func.create_three_addr_gpr(ThreeAddrGprOp::Add, r0, r0, one, false, Condition::Al)?;
//! func.append(entry, add)?;
//!
//! let text = tpde_arm32::arm32::emit_function(&session, &func, &EmitOptions::default()).unwrap();
//! assert!(text.contains("\tadd\tr0, r0, #1"));
//! # Ok::<(), tpde_arm32::core::ConstructionError>(())
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Shared infrastructure (session, registers, types, errors)
//! - [`arm32`] - ARM32 operands, instructions, branches and emission

pub mod arm32;
pub mod core;

pub use crate::arm32::{Condition, InstId, MachineFunction, NodeId, OperandId, VarId};
pub use crate::core::{
    AsmReg, BuildResult, CompilationSession, ConstructionError, EmitError, EmitResult,
    SessionStats, Type,
};
