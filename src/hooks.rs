use crate::context::MutationContext;

/// Outcome of a pre-mutation hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    /// Skip this mutant; it is recorded as skipped, not survived.
    Skip,
}

/// Host-supplied extension points, threaded explicitly through the engine.
/// Every method has a no-op default; implementors override what they need.
/// A `pre_mutation` hook may also narrow `context.config.test_command` to a
/// faster subset; with `rerun_all` enabled, survivors of the narrowed command
/// are re-checked against the full suite.
pub trait MutationHooks {
    /// Called once before a run starts.
    fn init(&self) {}

    /// Called before each mutant is applied.
    fn pre_mutation(&self, _context: &mut MutationContext) -> HookAction {
        HookAction::Continue
    }

    /// Called after the mutant's file has been restored.
    fn post_mutation(&self, _context: &mut MutationContext) {}

    /// Called for each candidate mutation during traversal.
    fn pre_mutation_ast(&self, _context: &mut MutationContext) {}
}

/// The default hook set: does nothing.
pub struct NoHooks;

impl MutationHooks for NoHooks {}
