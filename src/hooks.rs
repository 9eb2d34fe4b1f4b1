//! Lifecycle hooks.
//!
//! Hooks are callbacks registered per model around the four lifecycle events
//! (`save`, `create`, `update`, `destroy`), each with a `before` and an
//! `after` phase. They run strictly in registration order with the resource
//! as their only argument.
//!
//! A hook body returns [`HookFlow`]: `Continue` lets the pipeline proceed,
//! `Halt` stops the remaining hooks and the physical commit. Halting is a
//! routine short-circuit, not an error — it surfaces to the caller as an
//! unsaved result, never as a raised condition. An `Err` from a hook body is
//! a real failure and propagates.

use std::collections::HashMap;

use crate::error::Result;
use crate::resource::Resource;

/// The lifecycle events hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Save,
    Create,
    Update,
    Destroy,
}

/// Whether a hook runs before or after the physical commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

/// Cooperative control flow returned by each hook body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    Halt,
}

pub type HookFn = Box<dyn Fn(&mut Resource) -> Result<HookFlow>>;

/// Ordered per-model hook registry.
#[derive(Default)]
pub struct Hooks {
    table: HashMap<(Event, Phase), Vec<HookFn>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook for an event/phase pair. Execution order is
    /// registration order.
    pub fn register(&mut self, event: Event, phase: Phase, hook: HookFn) {
        self.table.entry((event, phase)).or_default().push(hook);
    }

    /// Run every hook registered for the pair, in order.
    ///
    /// Returns `Ok(true)` when the whole pipeline ran, `Ok(false)` when a
    /// hook halted it. Errors propagate immediately.
    pub fn run(&self, event: Event, phase: Phase, resource: &mut Resource) -> Result<bool> {
        if let Some(hooks) = self.table.get(&(event, phase)) {
            for hook in hooks {
                if hook(resource)? == HookFlow::Halt {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    pub fn is_empty(&self) -> bool {
        self.table.values().all(|hooks| hooks.is_empty())
    }

    fn count(&self) -> usize {
        self.table.values().map(|hooks| hooks.len()).sum()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").field("count", &self.count()).finish()
    }
}
