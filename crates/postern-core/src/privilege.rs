//! Process-wide privilege escalation
//!
//! Some mail operations normally require the caller to own the target user.
//! Provisioning on first login runs before any session exists, so it enters
//! an [`ElevatedScope`] for the duration of the call. The state is global to
//! the process: while any scope is alive, every task observes it.
//!
//! Scopes are counted rather than saved and restored, so concurrent tasks may
//! leave their scopes in any order.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

static ELEVATED_SCOPES: AtomicUsize = AtomicUsize::new(0);

/// Whether user role checks are currently bypassed
pub fn is_elevated() -> bool {
    ELEVATED_SCOPES.load(Ordering::SeqCst) > 0
}

/// Guard that bypasses role checks until dropped.
///
/// Released on drop, including during unwinding and when the owning future
/// is cancelled.
#[must_use = "privileges are dropped as soon as the scope is dropped"]
pub struct ElevatedScope {
    _private: (),
}

impl ElevatedScope {
    pub fn enter() -> Self {
        let depth = ELEVATED_SCOPES.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(depth, "Entered elevated privilege scope");
        Self { _private: () }
    }
}

impl Drop for ElevatedScope {
    fn drop(&mut self) {
        let depth = ELEVATED_SCOPES.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(depth, "Left elevated privilege scope");
    }
}
