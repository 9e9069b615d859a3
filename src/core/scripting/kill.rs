// src/core/scripting/kill.rs

//! `SCRIPT KILL` / `FUNCTION KILL` administrative termination.

use super::run_context::RunFlags;
use crate::core::SpinelDBError;
use crate::core::state::ServerState;
use std::sync::Arc;

/// `kill(admin_client, is_eval)`.
///
/// `is_eval` distinguishes `SCRIPT KILL` (ad-hoc `EVAL`/`EVALSHA` scripts) from `FUNCTION
/// KILL` (registered functions); this codebase only implements `EVAL`/`EVALSHA`, so every
/// running script is eval-mode and a `FUNCTION KILL` call always hits the cross-mode error.
pub fn kill(state: &Arc<ServerState>, is_eval: bool) -> Result<(), SpinelDBError> {
    let Some(shared) = state.script_runner.active_run() else {
        return Err(SpinelDBError::ScriptNotBusy);
    };

    if shared.caller_is_replication_applier {
        return Err(SpinelDBError::ScriptUnkillable(
            "UNKILLABLE Sorry the script was sent by the master instance and cannot be killed."
                .into(),
        ));
    }

    if shared.is_set(RunFlags::WRITE_DIRTY) {
        return Err(SpinelDBError::ScriptUnkillable(
            "UNKILLABLE Sorry the script already executed write commands against the dataset. \
             You can either wait the script termination or kill the server in a hard way \
             using the SHUTDOWN NOSAVE command."
                .into(),
        ));
    }

    let running_is_eval = shared.is_eval();
    if is_eval != running_is_eval {
        // The running script is in the other mode (e.g. `FUNCTION KILL` issued while an
        // ad-hoc `EVAL` script runs, or vice versa); from this admin command's point of
        // view nothing matching it is busy.
        return Err(SpinelDBError::ScriptWrongKillMode(
            "NOTBUSY No scripts in execution right now.".into(),
        ));
    }

    shared.set_flags(RunFlags::KILLED);
    Ok(())
}
