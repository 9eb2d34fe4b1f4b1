//! Cycle protection for recursive cascades.
//!
//! Association graphs may be cyclic (A has-one B, B belongs-to A), so every
//! recursive walk — dirty checks and the save cascade alike — runs under a
//! [`GuardSet`]: an in-progress set of (resource identity, operation) pairs
//! threaded through one call tree. On first entry a pair is recorded together
//! with the answer to hand out on re-entry; hitting the same pair again while
//! the first call is still on the stack means the walk came back around, and
//! the recorded default is returned instead of recursing further. The pair is
//! removed when the originating call returns, whatever the outcome.

use std::collections::HashMap;

use crate::error::Result;

/// The guarded operations. Keys are explicit tags, never derived from the
/// call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Save,
    SaveParents,
    Dirty,
    DirtyParents,
    DirtyChildren,
}

/// One (resource identity, operation) guard key.
pub type GuardKey = (usize, Op);

/// The in-progress set for one call tree.
#[derive(Debug, Default)]
pub struct GuardSet {
    in_flight: HashMap<GuardKey, bool>,
}

impl GuardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `body` once per call tree for this key. Re-entry while the first
    /// call is still running returns `default` without recursing.
    pub fn run_once(
        &mut self,
        key: GuardKey,
        default: bool,
        body: impl FnOnce(&mut GuardSet) -> bool,
    ) -> bool {
        if let Some(answer) = self.in_flight.get(&key) {
            return *answer;
        }
        self.in_flight.insert(key, default);
        let result = body(self);
        self.in_flight.remove(&key);
        result
    }

    /// Fallible variant of [`run_once`](Self::run_once). The sentinel is
    /// removed whether `body` succeeds or errors.
    pub fn try_run_once(
        &mut self,
        key: GuardKey,
        default: bool,
        body: impl FnOnce(&mut GuardSet) -> Result<bool>,
    ) -> Result<bool> {
        if let Some(answer) = self.in_flight.get(&key) {
            return Ok(*answer);
        }
        self.in_flight.insert(key, default);
        let result = body(self);
        self.in_flight.remove(&key);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatamapError;

    #[test]
    fn first_entry_runs_the_body() {
        let mut guard = GuardSet::new();
        let result = guard.run_once((1, Op::Dirty), true, |_| false);
        assert!(!result);
    }

    #[test]
    fn reentry_returns_the_default() {
        let mut guard = GuardSet::new();
        let result = guard.run_once((1, Op::Dirty), true, |guard| {
            // simulated cycle: same key, still in flight
            guard.run_once((1, Op::Dirty), true, |_| panic!("must not recurse"))
        });
        assert!(result);
    }

    #[test]
    fn distinct_ops_do_not_collide() {
        let mut guard = GuardSet::new();
        let result = guard.run_once((1, Op::DirtyParents), false, |guard| {
            guard.run_once((1, Op::DirtyChildren), false, |_| true)
        });
        assert!(result);
    }

    #[test]
    fn sentinel_is_removed_after_return() {
        let mut guard = GuardSet::new();
        guard.run_once((1, Op::Dirty), true, |_| false);
        // a fresh entry runs the body again
        let result = guard.run_once((1, Op::Dirty), true, |_| false);
        assert!(!result);
    }

    #[test]
    fn sentinel_is_removed_after_error() {
        let mut guard = GuardSet::new();
        let result = guard.try_run_once((1, Op::Save), true, |_| {
            Err(DatamapError::Store("boom".into()))
        });
        assert!(result.is_err());

        let result = guard.try_run_once((1, Op::Save), true, |_| Ok(false));
        assert_eq!(result.unwrap(), false);
    }
}
