//! Test utilities for arena-based testing.
//!
//! Every test builds its machine functions inside a fresh arena so that
//! names and register lists are released when the test ends.

#[cfg(test)]
pub mod test {
    use super::super::session::CompilationSession;
    use bumpalo::Bump;

    /// Test context that owns the arena of one test.
    pub struct TestContext {
        arena: Bump,
    }

    impl TestContext {
        /// Create a new test context with default capacity.
        pub fn new() -> Self {
            init_logging();
            Self { arena: Bump::new() }
        }

        /// Create a compilation session using this context's arena.
        ///
        /// The returned session borrows from the TestContext, so the
        /// TestContext must outlive the session.
        pub fn create_session(&self) -> CompilationSession<'_> {
            CompilationSession::new(&self.arena)
        }

        /// Bytes allocated in the arena so far.
        pub fn memory_used(&self) -> usize {
            self.arena.allocated_bytes()
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Route `log` output through the test harness; honours `RUST_LOG`.
    pub fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Run a test with a temporary arena context.
    pub fn with_test_context<F, R>(f: F) -> R
    where
        F: FnOnce(&TestContext) -> R,
    {
        let ctx = TestContext::new();
        f(&ctx)
    }

    #[test]
    fn test_context_tracks_arena_usage() {
        with_test_context(|ctx| {
            let session = ctx.create_session();
            let before = ctx.memory_used();
            session.intern_str("a_fairly_long_symbol_name_for_the_arena");
            assert!(ctx.memory_used() >= before);
        });
    }
}
