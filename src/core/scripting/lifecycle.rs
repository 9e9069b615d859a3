// src/core/scripting/lifecycle.rs

//! Process-wide singleton slot for the one script allowed to run at a time, plus the
//! prepare/reset lifecycle operations that install and tear it down.

use super::run_context::{RunContext, RunFlags, RunShared};
use crate::core::database::Db;
use crate::core::events::UnitOfWork;
use crate::core::state::ServerState;
use crate::core::state::client::ClientInfo;
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Tracks the single active run context and serializes script execution process-wide.
///
/// Redis's single-threaded event loop gets "at most one script running" for free; this
/// server is a multi-connection Tokio runtime, so the guarantee has to be built. A
/// [`tokio::sync::Mutex`] held across the entire prepare-to-reset span of a script is the
/// direct analogue: it genuinely serializes concurrent `EVAL`/`EVALSHA` invocations from
/// different connections, which is what `current_run_ctx`'s "non-empty between prepare and
/// reset" invariant is protecting in the original design.
#[derive(Debug)]
pub struct ScriptRunner {
    run_lock: Arc<Mutex<()>>,
    current: SyncMutex<Option<Arc<RunShared>>>,
    in_script: AtomicBool,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self {
            run_lock: Arc::new(Mutex::new(())),
            current: SyncMutex::new(None),
            in_script: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_script.load(Ordering::Acquire)
    }

    fn current_shared(&self) -> Option<Arc<RunShared>> {
        self.current.lock().clone()
    }

    pub fn current_function_name(&self) -> Option<String> {
        self.current_shared().map(|s| s.function_name.clone())
    }

    pub fn is_eval(&self) -> Option<bool> {
        self.current_shared().map(|s| s.is_eval())
    }

    pub fn is_timed_out(&self) -> bool {
        self.current_shared()
            .is_some_and(|s| s.is_set(RunFlags::TIMEDOUT))
    }

    pub fn snapshot_time_ms(&self) -> Option<u64> {
        self.current_shared().map(|s| s.snapshot_time_ms)
    }

    pub fn run_duration_ms(&self) -> Option<u64> {
        self.current_shared().map(|s| s.run_duration_ms())
    }

    /// The handle administrative `kill` and introspection commands act on.
    pub fn active_run(&self) -> Option<Arc<RunShared>> {
        self.current_shared()
    }

    /// `prepare(run_ctx, pseudo_client, caller, funcname)`.
    ///
    /// Blocks until any in-flight script has called `reset`, then installs `run_ctx` as
    /// the process-wide singleton. Returns a guard whose `reset` must be called exactly
    /// once to tear the invocation down.
    pub async fn prepare(
        self: &Arc<Self>,
        run_ctx: RunContext,
    ) -> ScriptRunGuard {
        let permit = self.run_lock.clone().lock_owned().await;
        *self.current.lock() = Some(run_ctx.shared.clone());
        self.in_script.store(true, Ordering::Release);
        debug!(function = %run_ctx.shared.function_name, "script prepared");
        ScriptRunGuard {
            runner: self.clone(),
            run_ctx: Some(run_ctx),
            _permit: permit,
        }
    }
}

/// RAII handle for one prepared script invocation. `reset()` should be called (normally, on
/// kill, or on timeout unwind) to run the full teardown sequence; dropping it without calling
/// `reset()` still releases the run lock and clears the singleton slot (via `Drop`, below),
/// but skips the atomicity bracket close and timed-out exit bookkeeping that only `reset()`
/// performs, so callers should always use `reset()` on every exit path they control.
pub struct ScriptRunGuard {
    runner: Arc<ScriptRunner>,
    run_ctx: Option<RunContext>,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for ScriptRunGuard {
    /// Safety net for the singleton invariant (spec §3.2.1/§8: "after reset, `is_running()`
    /// is false"). If `reset()` already ran, `run_ctx` is `None` and this is a no-op; if the
    /// guard is dropped early instead (a panic unwind, an early return before `reset()` is
    /// reached), this still clears `current`/`in_script` so a stale run never outlives its
    /// script.
    fn drop(&mut self) {
        if self.run_ctx.take().is_some() {
            *self.runner.current.lock() = None;
            self.runner.in_script.store(false, Ordering::Release);
        }
    }
}

impl ScriptRunGuard {
    pub fn run_ctx(&self) -> &RunContext {
        self.run_ctx.as_ref().expect("run context taken")
    }

    pub fn run_ctx_mut(&mut self) -> &mut RunContext {
        self.run_ctx.as_mut().expect("run context taken")
    }

    /// `reset(run_ctx)`.
    ///
    /// Performs the timed-out exit sequence if `TIMEDOUT` was set, emits the atomicity
    /// close-bracket if the open-bracket fired, and clears the singleton slot. Whole-script
    /// replication means the close-bracket here is bookkeeping only (see
    /// `gateway::maybe_emit_open_bracket`); the actual replicated unit is the single
    /// `Eval`/`EvalSha` command the router propagates once this returns.
    pub async fn reset(
        mut self,
        state: &Arc<ServerState>,
        db: &Arc<Db>,
    ) -> Option<UnitOfWork> {
        let run_ctx = self.run_ctx.take().expect("run context taken");
        let shared = run_ctx.shared.clone();

        if shared.is_set(RunFlags::TIMEDOUT) {
            Self::timed_out_exit(state);
        }

        let emitted_close_bracket = shared.is_set(RunFlags::MULTI_EMITTED);
        if emitted_close_bracket {
            debug!(function = %shared.function_name, "atomicity bracket closed");
        }

        drop(run_ctx);
        *self.runner.current.lock() = None;
        self.runner.in_script.store(false, Ordering::Release);

        // `self._permit` is dropped at end of scope, releasing the run lock and letting
        // the next queued `prepare` proceed.
        let _ = db;
        None
    }

    fn timed_out_exit(_state: &Arc<ServerState>) {
        // This server has no blocking-operation watchdog counter or a master-link client
        // that needs re-queuing onto an event loop (every connection already has its own
        // Tokio task), so the only part of the original timed-out exit sequence that
        // applies here is clearing `TIMEDOUT`, which happens when the shared flags are
        // dropped along with the run context above.
    }
}

/// `protect(client)` / `unprotect(client)`. Pins the caller's client record alive for the
/// script's duration by cloning its `Arc`; Rust's reference counting already gives us the
/// "still referenced objects are not freed" guarantee the C implementation has to build by
/// hand, so this is a thin lookup rather than a new subsystem.
pub fn protect_caller(state: &Arc<ServerState>, session_id: u64) -> Option<Arc<Mutex<ClientInfo>>> {
    state.clients.get(&session_id).map(|entry| entry.0.clone())
}
