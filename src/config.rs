//! Process-wide defaults.
//!
//! The only global knob the core carries is the default for
//! `raise_on_save_failure`. Resolution is first-defined-wins: the
//! per-instance override, then the per-model override, then this default.

use std::sync::atomic::{AtomicBool, Ordering};

static RAISE_ON_SAVE_FAILURE: AtomicBool = AtomicBool::new(false);

/// The global `raise_on_save_failure` default (initially `false`).
pub fn raise_on_save_failure() -> bool {
    RAISE_ON_SAVE_FAILURE.load(Ordering::Relaxed)
}

/// Set the global `raise_on_save_failure` default.
pub fn set_raise_on_save_failure(value: bool) {
    RAISE_ON_SAVE_FAILURE.store(value, Ordering::Relaxed);
}

/// Resolve the effective flag from the instance and model overrides.
pub(crate) fn resolve_raise_on_save_failure(
    instance: Option<bool>,
    model: Option<bool>,
) -> bool {
    instance.or(model).unwrap_or_else(raise_on_save_failure)
}
