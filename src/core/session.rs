// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession borrows an arena owned by the caller and hands out 'arena references to
// interned symbol and block names and to copied slices such as register lists, so every machine
// function built in the session shares one lifetime for its names. The session also keeps
// compilation statistics behind a RefCell so that functions and passes only need a shared
// reference: functions created, functions and native instructions emitted (with the largest
// function), branches changed by branch optimization and control-flow edges repointed.
// SessionStats implements Display for debug summaries.

//! Arena-based compilation session management.
//!
//! All names and slices allocated through the session live as long as the
//! arena, which outlives every machine function built in the session.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for names and slices.
    arena: &'arena Bump,

    /// Session statistics for debugging.
    stats: RefCell<SessionStats>,

    /// String interning for symbol and block names.
    interned_strings: RefCell<HashMap<String, &'arena str>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Allocate an object in the session arena.
    pub fn alloc<T>(&self, value: T) -> &'arena mut T {
        self.arena.alloc(value)
    }

    /// Allocate a slice in the session arena.
    pub fn alloc_slice<T>(&self, slice: &[T]) -> &'arena [T]
    where
        T: Clone,
    {
        self.arena.alloc_slice_clone(slice)
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Record that a machine function was created.
    pub fn record_function_created(&self) {
        self.stats.borrow_mut().functions_created += 1;
    }

    /// Record that a function was emitted as `native_insts` instructions.
    pub fn record_function_emitted(&self, name: &str, native_insts: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_emitted += 1;
        stats.native_insts_emitted += native_insts;

        if stats.largest_function_insts < native_insts {
            stats.largest_function_insts = native_insts;
            stats.largest_function_name = name.to_string();
        }
    }

    /// Record branches changed by a branch optimization run.
    pub fn record_branches_optimized(&self, count: usize) {
        self.stats.borrow_mut().branches_optimized += count;
    }

    /// Record a control-flow edge rewrite.
    pub fn record_edges_repointed(&self, changed: bool) {
        if changed {
            self.stats.borrow_mut().edges_repointed += 1;
        }
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of machine functions created.
    pub functions_created: usize,

    /// Number of functions emitted.
    pub functions_emitted: usize,

    /// Native instructions emitted across all functions.
    pub native_insts_emitted: usize,

    /// Largest function emitted, in native instructions.
    pub largest_function_insts: usize,

    /// Name of largest function.
    pub largest_function_name: String,

    /// Branches changed by branch optimization.
    pub branches_optimized: usize,

    /// Edge rewrites that changed at least one branch.
    pub edges_repointed: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Functions created: {}", self.functions_created)?;
        writeln!(f, "  Functions emitted: {}", self.functions_emitted)?;
        writeln!(f, "  Native instructions: {}", self.native_insts_emitted)?;
        writeln!(f, "  Branches optimized: {}", self.branches_optimized)?;
        writeln!(f, "  Edges repointed: {}", self.edges_repointed)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_insts
            )?;
        }

        Ok(())
    }
}
