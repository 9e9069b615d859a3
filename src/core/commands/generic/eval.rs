// src/core/commands/generic/eval.rs

use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{
    CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::database::{Db, ExecutionContext};
use crate::core::protocol::{RespFrame, RespValue};
use crate::core::scripting::{self, ReplicationFlags, RunContext};
use crate::core::SpinelDBError;
use async_trait::async_trait;
use bytes::Bytes;
use mlua::IntoLua;
use mlua::prelude::*;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;

/// Merges the write outcome from a `spinel.call` into the script's aggregated outcome.
fn update_aggregated_outcome(current_outcome: &RwLock<WriteOutcome>, new_outcome: WriteOutcome) {
    let mut current = current_outcome.write().unwrap();
    *current = current.merge(new_outcome);
}

/// Represents the EVAL command, which executes a Lua script.
///
/// # WARNING: Transaction Usage
///
/// Executing long-running or complex scripts inside a `MULTI`/`EXEC` transaction
/// can significantly impact server performance by holding locks for the entire
/// script's duration. It is recommended to use EVAL for short, fast operations
/// within transactions or to execute complex logic outside of a transaction block.
#[derive(Debug, Clone, Default)]
pub struct Eval {
    /// The Lua script to execute.
    pub script: Bytes,
    /// The number of keys passed to the script.
    pub num_keys: usize,
    /// The keys, which will be available in the script via the `KEYS` global table.
    pub keys: Vec<Bytes>,
    /// Additional arguments, available in the script via the `ARGV` global table.
    pub args: Vec<Bytes>,
}

impl ParseCommand for Eval {
    /// Parses the arguments for the EVAL command.
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        if args.len() < 2 {
            return Err(SpinelDBError::WrongArgumentCount("EVAL".to_string()));
        }
        let script = extract_bytes(&args[0])?;
        let num_keys: usize = extract_string(&args[1])?.parse()?;

        let keys_start_index = 2;
        let keys_end_index = keys_start_index + num_keys;

        if args.len() < keys_end_index {
            return Err(SpinelDBError::InvalidState(
                "Number of keys specified is greater than the number of arguments provided.".into(),
            ));
        }

        let keys = args[keys_start_index..keys_end_index]
            .iter()
            .map(extract_bytes)
            .collect::<Result<_, _>>()?;
        let eval_args = args[keys_end_index..]
            .iter()
            .map(extract_bytes)
            .collect::<Result<_, _>>()?;

        Ok(Eval {
            script,
            num_keys,
            keys,
            args: eval_args,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Eval {
    /// Executes the Lua script in a sandboxed environment, routing every command the
    /// script issues through the same gateway a real client's commands pass through.
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        let script = self.script.clone();
        let keys = self.keys.clone();
        let args = self.args.clone();

        let server_state = Arc::clone(&ctx.state);
        let db: Arc<Db> = ctx.db.clone().into();
        let session_id = ctx.session_id;
        let authenticated_user = ctx.authenticated_user.clone();
        let caller_is_replication_applier = ctx.is_replication_applier;

        let protected_caller = scripting::protect_caller(&server_state, session_id);
        let caller_db_index = match &protected_caller {
            Some(client) => client.lock().await.db_index,
            None => 0,
        };
        // Propagates the caller's actual `MULTI` state into the pseudo-client (spec §4.1),
        // which is what `maybe_emit_open_bracket`'s `!in_transaction` guard judges.
        let caller_in_transaction = db
            .tx_states
            .get(&session_id)
            .is_some_and(|tx| tx.in_transaction);

        let (timeout_duration, memory_limit_mb, maxmemory) = {
            let config = ctx.state.config.lock().await;
            (
                Duration::from_millis(config.safety.script_timeout_ms),
                config.safety.script_memory_limit_mb,
                config.maxmemory,
            )
        };
        let script_has_mem_limit = memory_limit_mb > 0;

        // Latched once at prepare time; see `RunContext::oom_latched`.
        let oom_latched = maxmemory.is_some_and(|cap| {
            let total_memory: usize = server_state.dbs.iter().map(|d| d.get_current_memory()).sum();
            total_memory >= cap
        });

        // Since `mlua::Lua` is not `Send`, the entire Lua interaction must happen
        // within a dedicated thread managed by `spawn_blocking`.
        let lua_future = tokio::task::spawn_blocking(
            move || -> mlua::Result<(RespValue, WriteOutcome)> {
                let lua = Lua::new();

                if script_has_mem_limit {
                    let limit_in_bytes = memory_limit_mb * 1024 * 1024;
                    lua.set_memory_limit(limit_in_bytes).map_err(|e| {
                        mlua::Error::external(SpinelDBError::Internal(format!(
                            "Failed to set Lua memory limit: {e}"
                        )))
                    })?;
                }

                let globals = lua.globals();

                // Sandbox the Lua environment by removing potentially dangerous functions.
                globals.set("loadfile", mlua::Value::Nil)?;
                globals.set("dofile", mlua::Value::Nil)?;
                globals.set("collectgarbage", mlua::Value::Nil)?;
                if let Ok(mlua::Value::Table(os_table)) = globals.get::<mlua::Value>("os") {
                    os_table.set("execute", mlua::Value::Nil)?;
                    os_table.set("exit", mlua::Value::Nil)?;
                }
                if let Ok(mlua::Value::Table(io_table)) = globals.get::<mlua::Value>("io") {
                    io_table.set("open", mlua::Value::Nil)?;
                    io_table.set("popen", mlua::Value::Nil)?;
                }

                // Install this invocation as the process-wide singleton running script.
                let run_ctx = RunContext::new(
                    "eval".to_string(),
                    true,
                    session_id,
                    caller_db_index,
                    authenticated_user,
                    caller_in_transaction,
                    caller_is_replication_applier,
                    oom_latched,
                    protected_caller,
                );
                let guard = tokio::runtime::Handle::current()
                    .block_on(server_state.script_runner.prepare(run_ctx));
                let shared_for_interrupt = guard.run_ctx().shared.clone();
                let guard = Arc::new(TokioMutex::new(Some(guard)));

                // Cooperative cancellation: the VM calls this on every instruction-count
                // tick, which is our only chance to observe a `SCRIPT KILL` or a script
                // that has overrun its time budget without a native preemption point.
                let threshold = timeout_duration;
                lua.set_interrupt(move |_lua| {
                    match scripting::interrupt(&shared_for_interrupt, threshold) {
                        scripting::InterruptAction::Continue => Ok(mlua::VmState::Continue),
                        scripting::InterruptAction::Kill => {
                            Err(mlua::Error::external(SpinelDBError::ScriptKilledByUser))
                        }
                    }
                });

                let aggregated_outcome = Arc::new(RwLock::new(WriteOutcome::DidNotWrite));
                let spinel_table = lua.create_table()?;

                // `spinel.call`: propagates the script-issued command's error to the caller.
                {
                    let guard = Arc::clone(&guard);
                    let state = Arc::clone(&server_state);
                    let db = Arc::clone(&db);
                    let aggregated_outcome = Arc::clone(&aggregated_outcome);
                    let call_callback =
                        lua.create_async_function(move |lua, m_args: mlua::MultiValue| {
                            let guard = Arc::clone(&guard);
                            let state = Arc::clone(&state);
                            let db = Arc::clone(&db);
                            let aggregated_outcome = Arc::clone(&aggregated_outcome);
                            async move {
                                let mut argv = Vec::new();
                                for val in m_args.into_vec() {
                                    argv.push(lua_value_to_bytes(val)?);
                                }
                                let mut g = guard.lock().await;
                                let run_ctx =
                                    g.as_mut().expect("script guard taken").run_ctx_mut();
                                let (resp_val, outcome) =
                                    scripting::call_command(run_ctx, &state, &db, argv).await?;
                                update_aggregated_outcome(&aggregated_outcome, outcome);
                                resp_value_to_lua_value(&lua, resp_val)
                            }
                        })?;
                    spinel_table.set("call", call_callback)?;
                }

                // `spinel.pcall`: same dispatch, but captures the error as a Lua table.
                {
                    let guard = Arc::clone(&guard);
                    let state = Arc::clone(&server_state);
                    let db = Arc::clone(&db);
                    let aggregated_outcome = Arc::clone(&aggregated_outcome);
                    let pcall_callback =
                        lua.create_async_function(move |lua, m_args: mlua::MultiValue| {
                            let guard = Arc::clone(&guard);
                            let state = Arc::clone(&state);
                            let db = Arc::clone(&db);
                            let aggregated_outcome = Arc::clone(&aggregated_outcome);
                            async move {
                                let mut argv = Vec::new();
                                for val in m_args.into_vec() {
                                    argv.push(lua_value_to_bytes(val)?);
                                }
                                let mut g = guard.lock().await;
                                let run_ctx =
                                    g.as_mut().expect("script guard taken").run_ctx_mut();
                                match scripting::call_command(run_ctx, &state, &db, argv).await {
                                    Ok((resp_val, outcome)) => {
                                        update_aggregated_outcome(&aggregated_outcome, outcome);
                                        resp_value_to_lua_value(&lua, resp_val)
                                    }
                                    Err(e) => Ok(LuaValue::Table(lua_error_to_table(&lua, e)?)),
                                }
                            }
                        })?;
                    spinel_table.set("pcall", pcall_callback)?;
                }

                // `spinel.setresp(n)`: switch the pseudo-client's protocol version.
                {
                    let guard = Arc::clone(&guard);
                    let setresp_callback =
                        lua.create_async_function(move |_, version: i64| {
                            let guard = Arc::clone(&guard);
                            async move {
                                let mut g = guard.lock().await;
                                g.as_mut()
                                    .expect("script guard taken")
                                    .run_ctx_mut()
                                    .pseudo_client
                                    .set_protocol_version(version)
                                    .map_err(mlua::Error::external)
                            }
                        })?;
                    spinel_table.set("setresp", setresp_callback)?;
                }

                // `spinel.set_repl(mask)`: restrict which destinations see this script's
                // writes. `spinel.replicate_commands()` is a no-op kept for compatibility
                // with scripts written against effects-replication being opt-in.
                {
                    let guard = Arc::clone(&guard);
                    let set_repl_callback = lua.create_async_function(move |_, mask: u8| {
                        let guard = Arc::clone(&guard);
                        async move {
                            let mut g = guard.lock().await;
                            g.as_mut().expect("script guard taken").run_ctx_mut().repl_flags =
                                ReplicationFlags::from_bits_truncate(mask);
                            Ok(())
                        }
                    })?;
                    spinel_table.set("set_repl", set_repl_callback)?;
                }
                spinel_table.set(
                    "replicate_commands",
                    lua.create_function(|_, ()| Ok(true))?,
                )?;
                spinel_table.set(
                    "REPL_ALL",
                    (ReplicationFlags::PROPAGATE_LOG | ReplicationFlags::PROPAGATE_REPLICAS).bits(),
                )?;
                spinel_table.set("REPL_AOF", ReplicationFlags::PROPAGATE_LOG.bits())?;
                spinel_table.set("REPL_SLAVE", ReplicationFlags::PROPAGATE_REPLICAS.bits())?;
                spinel_table.set("REPL_REPLICA", ReplicationFlags::PROPAGATE_REPLICAS.bits())?;
                spinel_table.set("REPL_NONE", ReplicationFlags::empty().bits())?;

                globals.set("spinel", spinel_table)?;

                // Expose the KEYS table to the script.
                let keys_table = lua
                    .create_table_from(keys.iter().enumerate().map(|(i, k)| (i + 1, k.as_ref())))?;
                globals.set("KEYS", keys_table)?;

                // Expose the ARGV table to the script.
                let argv_table = lua
                    .create_table_from(args.iter().enumerate().map(|(i, a)| (i + 1, a.as_ref())))?;
                globals.set("ARGV", argv_table)?;

                drop(globals);

                // Execute the async Lua script using the handle of the main Tokio runtime.
                // This avoids creating a nested runtime, which is a major anti-pattern.
                let eval_result = tokio::runtime::Handle::current()
                    .block_on(lua.load(&*script).eval_async::<LuaValue>());

                // `reset` must run on every exit path, success or failure, so the
                // singleton slot and run lock are always released for the next script.
                // `guard` is still held by the `spinel.*` closures registered on `lua`/
                // `spinel_table` (both still in scope), so its `Arc` strong count is
                // never 1 here -- take the guard out of the shared `Mutex` instead of
                // requiring unique ownership of the `Arc` itself.
                let guard = tokio::runtime::Handle::current()
                    .block_on(async { guard.lock().await.take() })
                    .expect("script guard already taken");
                tokio::runtime::Handle::current().block_on(guard.reset(&server_state, &db));

                let resp_value = lua_value_to_resp_value(eval_result?)?;
                Ok((resp_value, *aggregated_outcome.read().unwrap()))
            },
        );

        match lua_future.await {
            Ok(Ok(res)) => Ok(res),
            Ok(Err(e)) => {
                // Check if the error is due to memory limit.
                if let LuaError::MemoryError(_) = e {
                    return Err(SpinelDBError::MaxMemoryReached);
                }
                Err(SpinelDBError::from(e))
            }
            Err(join_err) => Err(SpinelDBError::Internal(format!(
                "Lua execution task panicked: {join_err}"
            ))),
        }
    }
}

// --- Type Conversion Helpers ---

/// Converts a `LuaValue` into the bytes a script-issued command's argument carries on
/// the wire. Only strings and numbers are valid `spinel.call`/`spinel.pcall` arguments,
/// matching how a real client's command line is always just bulk strings.
fn lua_value_to_bytes(lua_val: LuaValue) -> mlua::Result<Bytes> {
    match lua_val {
        LuaValue::String(s) => Ok(Bytes::copy_from_slice(&s.as_bytes())),
        LuaValue::Integer(i) => Ok(Bytes::from(i.to_string())),
        LuaValue::Number(n) => Ok(Bytes::from(n.to_string())),
        _ => Err(mlua::Error::FromLuaConversionError {
            from: lua_val.type_name(),
            to: "command argument".to_string(),
            message: Some("spinel.call/pcall arguments must be strings or numbers".to_string()),
        }),
    }
}

/// Converts a `LuaValue` to a `RespValue` for the final client response.
fn lua_value_to_resp_value(lua_val: LuaValue) -> mlua::Result<RespValue> {
    match lua_val {
        LuaValue::String(s) => Ok(RespValue::BulkString(Bytes::copy_from_slice(&s.as_bytes()))),
        LuaValue::Integer(i) => Ok(RespValue::Integer(i)),
        LuaValue::Number(n) => Ok(RespValue::BulkString(n.to_string().into())),
        LuaValue::Boolean(b) => Ok(RespValue::Integer(b as i64)),
        mlua::Value::Nil => Ok(RespValue::Null),
        LuaValue::Table(t) => {
            let mut items = Vec::new();
            for pair in t.pairs::<LuaValue, LuaValue>() {
                let (_, v) = pair?;
                items.push(lua_value_to_resp_value(v)?);
            }
            Ok(RespValue::Array(items))
        }
        _ => Err(mlua::Error::FromLuaConversionError {
            from: lua_val.type_name(),
            to: "RespValue".to_string(),
            message: Some("Unsupported type conversion".to_string()),
        }),
    }
}

/// Converts a `RespValue` from a command result back into a `LuaValue`.
fn resp_value_to_lua_value(lua: &Lua, resp_val: RespValue) -> mlua::Result<LuaValue> {
    match resp_val {
        RespValue::SimpleString(s) => s.into_lua(lua),
        RespValue::BulkString(b) => b.into_lua(lua),
        RespValue::Integer(i) => i.into_lua(lua),
        RespValue::Null => Ok(mlua::Value::Nil),
        RespValue::NullArray => Ok(LuaValue::Boolean(false)),
        RespValue::Error(e) => {
            let err_table = lua.create_table()?;
            err_table.set("err", e)?;
            Ok(LuaValue::Table(err_table))
        }
        RespValue::Array(arr) => {
            let table = lua.create_table_with_capacity(arr.len(), 0)?;
            for (i, item) in arr.into_iter().enumerate() {
                table.set(i + 1, resp_value_to_lua_value(lua, item)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}

/// Converts a `SpinelDBError` into a Lua table for `spinel.pcall`.
fn lua_error_to_table(lua: &Lua, error: SpinelDBError) -> mlua::Result<LuaTable> {
    let table = lua.create_table()?;
    table.set("err", error.to_string())?;
    Ok(table)
}

impl From<SpinelDBError> for mlua::Error {
    fn from(e: SpinelDBError) -> Self {
        mlua::Error::external(e)
    }
}

impl CommandSpec for Eval {
    fn name(&self) -> &'static str {
        "eval"
    }
    fn arity(&self) -> i64 {
        -3
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn first_key(&self) -> i64 {
        3
    }
    fn last_key(&self) -> i64 {
        if self.num_keys > 0 {
            2 + self.num_keys as i64
        } else {
            0
        }
    }
    fn step(&self) -> i64 {
        1
    }
    fn get_keys(&self) -> Vec<Bytes> {
        self.keys.clone()
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.script.clone(), self.num_keys.to_string().into()];
        args.extend(self.keys.clone());
        args.extend(self.args.clone());
        args
    }
}
