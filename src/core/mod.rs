// This module holds the target-independent infrastructure the ARM32 model is built on: the
// arena-backed compilation session (interned names, arena slices and statistics), register
// identifiers and register sets, the IR value types with their per-target attribute table, and
// the construction and emission error types.

//! Core infrastructure shared by the backend.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based memory allocation using `bumpalo`
//! - String interning and compilation statistics
//!
//! ## Registers (`register_file`)
//! - Bank/index register identifiers
//! - Bitset register sets with ascending iteration
//!
//! ## Types (`types`)
//! - Value types and their load/store attributes

pub mod error;
pub mod register_file;
pub mod session;
pub mod test_utils;
pub mod types;

pub use error::{BuildResult, ConstructionError, EmitError, EmitResult};
pub use register_file::{AsmReg, RegBank, RegBitSet, RegId};
pub use session::{CompilationSession, SessionStats};
pub use types::Type;
