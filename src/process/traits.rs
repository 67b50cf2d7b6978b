/*!
 * Process Traits
 * Process entry point abstraction
 */

use super::types::{ExecutionContext, StepOutcome};

/// Entry procedure of a process
///
/// The scheduler calls `step` once per dispatch with the process's own saved
/// context loaded. A process keeps its state in that context or behind its
/// own interior mutability.
pub trait ProcessEntry: Send + Sync {
    /// Run one slice of the process
    fn step(&self, ctx: &mut ExecutionContext) -> StepOutcome;

    /// Human-readable name
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> ProcessEntry for F
where
    F: Fn(&mut ExecutionContext) -> StepOutcome + Send + Sync,
{
    fn step(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        self(ctx)
    }
}

/// Entry with an explicit name around any other entry
pub struct Named<E> {
    name: String,
    entry: E,
}

impl<E: ProcessEntry> Named<E> {
    pub fn new(name: impl Into<String>, entry: E) -> Self {
        Self {
            name: name.into(),
            entry,
        }
    }
}

impl<E: ProcessEntry> ProcessEntry for Named<E> {
    fn step(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        self.entry.step(ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Entry that yields forever
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleLoop;

impl ProcessEntry for IdleLoop {
    fn step(&self, _ctx: &mut ExecutionContext) -> StepOutcome {
        StepOutcome::Yield
    }

    fn name(&self) -> &str {
        "idle"
    }
}
