// src/core/scripting/timeout.rs

//! Elapsed-time checking, the timed-out transition, and the cooperative interrupt tick
//! the Lua engine polls from inside a running script.

use super::run_context::{RunFlags, RunShared};
use std::time::Duration;
use tracing::warn;

/// Result of a single `interrupt()` poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    Continue,
    Kill,
}

/// `interrupt(run_ctx) -> {CONTINUE, KILL}`.
///
/// Redis's single-threaded core has to pump its own event loop here so an administrative
/// `kill` arriving on another connection gets a chance to run at all. On this server every
/// connection already owns its own Tokio task, so a concurrent `SCRIPT KILL` reaches the
/// `KILLED` bit directly through `RunShared`'s atomic without any cooperation from the
/// running script — the "event pump" degenerates to a plain flag read. `threshold =
/// Duration::ZERO` disables the timeout check entirely (mirrors `script_timeout_ms = 0`).
pub fn interrupt(shared: &RunShared, threshold: Duration) -> InterruptAction {
    if shared.is_set(RunFlags::TIMEDOUT) {
        return if shared.is_set(RunFlags::KILLED) {
            InterruptAction::Kill
        } else {
            InterruptAction::Continue
        };
    }

    if threshold.is_zero() {
        return InterruptAction::Continue;
    }

    let elapsed = shared.start.elapsed();
    if elapsed < threshold {
        return InterruptAction::Continue;
    }

    warn!(
        function = %shared.function_name,
        elapsed_ms = elapsed.as_millis() as u64,
        "slow script detected"
    );
    shared.set_flags(RunFlags::TIMEDOUT);

    if shared.is_set(RunFlags::KILLED) {
        InterruptAction::Kill
    } else {
        InterruptAction::Continue
    }
}
