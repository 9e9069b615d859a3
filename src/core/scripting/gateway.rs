// src/core/scripting/gateway.rs

//! `call_command`: the validator pipeline every script-issued command passes through
//! before it reaches the same dispatcher a real client's commands go through.

use super::run_context::{ReplicationFlags, RunContext, RunFlags};
use crate::config::ReplicationConfig;
use crate::core::commands::command_trait::{CommandExt, CommandFlags, WriteOutcome};
use crate::core::database::{Db, ExecutionContext};
use crate::core::protocol::{RespFrame, RespValue};
use crate::core::state::ServerState;
use crate::core::{Command, SpinelDBError};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::warn;

/// Entry point `call_command(run_ctx, argv, argc) -> result_or_error`.
///
/// Mirrors the pipeline in `handler/pipeline/` (ACL, cluster redirect, state checks) but
/// tailored to a script-issued command: denials are returned to the caller (the Lua engine
/// via `spinel.call`/`spinel.pcall`), never surfaced as a client-facing MOVED/ASK redirect
/// or a torn-down session, exactly as an ordinary command error would be for a real client.
pub async fn call_command(
    run_ctx: &mut RunContext,
    state: &Arc<ServerState>,
    db: &Arc<Db>,
    argv: Vec<Bytes>,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    // 1. Argument binding: the pseudo-client's authenticated user is the caller's, so
    // authorization below is evaluated under the caller's identity, not some neutral one.
    let raw_args: Vec<RespFrame> = argv
        .into_iter()
        .map(RespFrame::BulkString)
        .collect();

    // 2. Filter hooks: no command-filter-hook subsystem exists in this codebase to invoke.

    // 3/4. Lookup + arity. `Command::try_from` resolves the command table entry and each
    // command's own `ParseCommand::parse` enforces its arity, so unknown-command and
    // wrong-arity both surface here as the same error the dispatcher would give a client.
    let command = Command::try_from(RespFrame::Array(raw_args.clone()))?;
    run_ctx.pseudo_client.current_command = Some(command.clone());

    let flags = command.get_flags();

    // 5. Script-forbidden check.
    if flags.contains(CommandFlags::NOSCRIPT) || flags.contains(CommandFlags::TRANSACTION) {
        return Err(SpinelDBError::ScriptCommandNotAllowed);
    }

    // 6. Authorization, evaluated as the caller's identity and audited under a
    // "from-script" marker (this codebase has no separate audit-log subsystem; tracing is
    // its equivalent elsewhere, so the script-context denial is logged the same way).
    let keys_bytes = command.get_keys();
    let keys_as_strings: Vec<String> = keys_bytes
        .iter()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .collect();

    if state.acl_config.read().await.enabled
        && !state.acl_enforcer.read().await.check_permission(
            run_ctx.pseudo_client.authenticated_user.as_deref(),
            &raw_args,
            command.name(),
            flags,
            &keys_as_strings,
            &[],
        )
    {
        warn!(
            target: "from-script",
            function = %run_ctx.shared.function_name,
            command = command.name(),
            "script command denied by ACL"
        );
        return Err(SpinelDBError::NoPermission);
    }

    // 7. Write-allowed check.
    if flags.contains(CommandFlags::WRITE) {
        if run_ctx.shared.is_set(RunFlags::READ_ONLY) {
            return Err(SpinelDBError::ScriptReadOnlyWrite);
        }

        if !run_ctx.shared.caller_is_replication_applier {
            if state.is_read_only.load(Ordering::SeqCst) {
                return Err(SpinelDBError::ReadOnly(
                    "Server is in read-only mode".into(),
                ));
            }
            if state.is_emergency_read_only.load(Ordering::SeqCst) {
                return Err(SpinelDBError::ReadOnly(
                    "Server is in read-only mode due to a critical propagation failure.".into(),
                ));
            }
            let is_replica = matches!(
                state.config.lock().await.replication,
                ReplicationConfig::Replica { .. }
            );
            if is_replica {
                return Err(SpinelDBError::ReadOnly(
                    "You can't write against a read only replica.".into(),
                ));
            }
        }
    }

    // 8. OOM check. Once the script has written, it must be allowed to finish even under
    // memory pressure so the already-performed writes are not left half-committed. The
    // pressure itself was latched at `prepare` time (`run_ctx.oom_latched`), not resampled
    // here, so a script that started clean never gets blocked by pressure that only
    // appears after its first write.
    if flags.contains(CommandFlags::DENY_OOM)
        && !run_ctx.shared.caller_is_replication_applier
        && !matches!(
            state.config.lock().await.replication,
            ReplicationConfig::Replica { .. }
        )
        && !run_ctx.shared.is_set(RunFlags::WRITE_DIRTY)
        && run_ctx.oom_latched
    {
        return Err(SpinelDBError::MaxMemoryReached);
    }

    // 9. Write bookkeeping, before dispatch.
    if flags.contains(CommandFlags::WRITE) {
        run_ctx.shared.set_flags(RunFlags::WRITE_DIRTY);
    }

    // 10. Cluster locality check. Skipped for the log loader and the upstream master,
    // which must be allowed to apply whatever they were given regardless of slot layout
    // on this node (e.g. mid-resharding replication catch-up). Maps the resolver's reason
    // to the two outcomes this crate can actually distinguish (spec §4.4 step 10): a slot
    // with no owner at all is cluster-down; a slot owned by a different node is non-local.
    // This crate has no separate "cluster down but still serving reads" mode, so the
    // write-in-read-only-cluster-state variant of the resolver's three outcomes collapses
    // into the plain cluster-down case.
    if let Some(cluster_state) = &state.cluster
        && !run_ctx.shared.caller_is_replication_applier
        && !keys_bytes.is_empty()
    {
        for key in &keys_bytes {
            let slot = crate::core::cluster::slot::get_slot(key);
            match cluster_state.get_node_for_slot(slot) {
                None => {
                    return Err(SpinelDBError::ClusterDown(
                        "CLUSTERDOWN Hash slot not served".into(),
                    ));
                }
                Some(owner) if owner.node_info.id != cluster_state.my_id => {
                    return Err(SpinelDBError::ScriptNonLocalKey);
                }
                _ => {}
            }
        }
    }

    // 11. Atomicity bracket. This server propagates the whole script as a single `Eval`
    // command rather than per-command effects, so the replicated unit is already atomic
    // by construction; `MULTI_EMITTED` is tracked purely so the invariants in §4.6 hold
    // for introspection and tests, with no separate begin/commit markers to emit.
    maybe_emit_open_bracket(run_ctx);

    // 12. Dispatch.
    let mut ctx = ExecutionContext {
        state: state.clone(),
        locks: db.determine_locks_for_command(&command).await,
        db,
        command: Some(command.clone()),
        session_id: run_ctx.shared.caller_session_id,
        authenticated_user: run_ctx.pseudo_client.authenticated_user.clone(),
        is_replication_applier: run_ctx.shared.caller_is_replication_applier,
    };
    let result = command.execute(&mut ctx).await;

    // 13. Post-assertion: blocking commands are excluded by the NOSCRIPT check in step 5,
    // so nothing dispatched here can leave the pseudo-client waiting.

    result
}

/// **Emit open-bracket**: fires the first time a script has a write to bracket, provided
/// the caller isn't already inside a user-initiated `MULTI` (which owns its own bracket)
/// and at least one replication destination is enabled.
fn maybe_emit_open_bracket(run_ctx: &mut RunContext) {
    if run_ctx.shared.is_set(RunFlags::MULTI_EMITTED)
        || run_ctx.pseudo_client.in_transaction
        || !run_ctx.shared.is_set(RunFlags::WRITE_DIRTY)
        || run_ctx.repl_flags == ReplicationFlags::empty()
    {
        return;
    }
    run_ctx.shared.set_flags(RunFlags::MULTI_EMITTED);
    run_ctx.pseudo_client.in_transaction = true;
}
