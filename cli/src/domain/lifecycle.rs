//! Run-phase state machine.
//!
//! `Unstaged → Staged → Provisioned → Verified → Destroyed`, plus the forced
//! move to `Destroyed` from any phase that may own live resources.

pub use tfprobe_common::RunPhase;

use crate::domain::error::LifecycleError;

/// Tracks the phase of one run and rejects illegal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTracker {
    current: RunPhase,
    furthest: RunPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: RunPhase::Unstaged,
            furthest: RunPhase::Unstaged,
        }
    }
}

impl PhaseTracker {
    #[must_use]
    pub fn current(&self) -> RunPhase {
        self.current
    }

    /// Furthest phase reached before `Destroyed`.
    #[must_use]
    pub fn furthest(&self) -> RunPhase {
        self.furthest
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError` if `next` is not reachable from the current phase.
    pub fn advance(&mut self, next: RunPhase) -> Result<(), LifecycleError> {
        if !is_allowed(self.current, next) {
            return Err(LifecycleError {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        if next != RunPhase::Destroyed {
            self.furthest = next;
        }
        Ok(())
    }
}

fn is_allowed(from: RunPhase, to: RunPhase) -> bool {
    use RunPhase::{Destroyed, Provisioned, Staged, Unstaged, Verified};
    matches!(
        (from, to),
        (Unstaged, Staged)
            | (Staged, Provisioned)
            | (Provisioned, Verified)
            | (Staged | Provisioned | Verified, Destroyed)
    )
}
