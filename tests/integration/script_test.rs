// tests/integration/script_test.rs

//! Integration tests for the scripting execution core: `EVAL`/`EVALSHA`,
//! `SCRIPT LOAD`/`EXISTS`/`FLUSH`/`KILL`, and the validator pipeline a
//! script-issued command passes through.

use super::test_helpers::TestContext;
use bytes::Bytes;
use spineldb::core::Command;
use spineldb::core::RespValue;
use spineldb::core::SpinelDBError;
use spineldb::core::commands::generic::eval::Eval;
use spineldb::core::commands::generic::evalsha::EvalSha;
use spineldb::core::commands::generic::script::{Script, ScriptSubcommand};
use spineldb::core::scripting::{RunContext, RunFlags};

fn eval(script: &str, keys: Vec<&str>, args: Vec<&str>) -> Command {
    Command::Eval(Eval {
        script: Bytes::copy_from_slice(script.as_bytes()),
        num_keys: keys.len(),
        keys: keys.into_iter().map(Bytes::copy_from_slice).collect(),
        args: args.into_iter().map(Bytes::copy_from_slice).collect(),
    })
}

// ===== Read-only and write scripts (spec.md §8 scenarios 1-2) =====

#[tokio::test]
async fn read_only_script_succeeds_with_no_errors() {
    let ctx = TestContext::new().await;
    ctx.set("x", "1").await.unwrap();
    ctx.set("y", "2").await.unwrap();

    let result = ctx
        .execute(eval(
            "return {spinel.call('get', KEYS[1]), spinel.call('get', KEYS[2])}",
            vec!["x", "y"],
            vec![],
        ))
        .await
        .unwrap();

    match result {
        RespValue::Array(items) => assert_eq!(items.len(), 2),
        other => panic!("expected array reply, got {other:?}"),
    }
}

#[tokio::test]
async fn write_script_sets_and_reads_back_through_the_gateway() {
    let ctx = TestContext::new().await;

    let result = ctx
        .execute(eval(
            "spinel.call('set', KEYS[1], ARGV[1]); return spinel.call('get', KEYS[1])",
            vec!["mykey"],
            vec!["myval"],
        ))
        .await
        .unwrap();

    assert_eq!(result, RespValue::BulkString(Bytes::from_static(b"myval")));

    // Confirm the write actually landed in the real database, not just the
    // script's own view of it.
    let readback = ctx.get("mykey").await.unwrap();
    assert_eq!(readback, RespValue::BulkString(Bytes::from_static(b"myval")));
}

#[tokio::test]
async fn script_can_issue_multiple_writes_in_sequence() {
    let ctx = TestContext::new().await;

    ctx.execute(eval(
        "spinel.call('set', KEYS[1], '1'); spinel.call('incr', KEYS[1]); spinel.call('incr', KEYS[1])",
        vec!["counter"],
        vec![],
    ))
    .await
    .unwrap();

    let value = ctx.get("counter").await.unwrap();
    assert_eq!(value, RespValue::BulkString(Bytes::from_static(b"3")));
}

// ===== Script-forbidden commands (spec.md §4.4 step 5) =====

#[tokio::test]
async fn blocking_command_is_rejected_as_not_allowed_from_script() {
    let ctx = TestContext::new().await;

    let result = ctx
        .execute(eval(
            "return spinel.call('blpop', KEYS[1], '0')",
            vec!["list"],
            vec![],
        ))
        .await;

    assert!(matches!(
        result,
        Err(SpinelDBError::ScriptCommandNotAllowed)
    ));
}

#[tokio::test]
async fn watch_is_rejected_as_not_allowed_from_script() {
    let ctx = TestContext::new().await;

    let result = ctx
        .execute(eval("return spinel.call('watch', KEYS[1])", vec!["k"], vec![]))
        .await;

    assert!(matches!(
        result,
        Err(SpinelDBError::ScriptCommandNotAllowed)
    ));
}

#[tokio::test]
async fn unknown_command_from_script_is_rejected() {
    let ctx = TestContext::new().await;

    let result = ctx
        .execute(eval("return spinel.call('totally_not_a_command')", vec![], vec![]))
        .await;

    assert!(result.is_err());
}

// ===== SCRIPT LOAD / EXISTS / FLUSH / EVALSHA =====

#[tokio::test]
async fn evalsha_without_a_prior_load_returns_noscript() {
    let ctx = TestContext::new().await;

    let result = ctx
        .execute(Command::EvalSha(EvalSha {
            sha1: "0000000000000000000000000000000000000000".to_string(),
            num_keys: 0,
            keys: vec![],
            args: vec![],
        }))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn script_load_then_evalsha_executes_the_cached_body() {
    let ctx = TestContext::new().await;

    let sha1 = match ctx
        .execute(Command::Script(Script {
            subcommand: ScriptSubcommand::Load(Bytes::from_static(b"return 'loaded'")),
        }))
        .await
        .unwrap()
    {
        RespValue::BulkString(b) => String::from_utf8(b.to_vec()).unwrap(),
        other => panic!("expected bulk string sha1, got {other:?}"),
    };

    let exists = ctx
        .execute(Command::Script(Script {
            subcommand: ScriptSubcommand::Exists(vec![sha1.clone()]),
        }))
        .await
        .unwrap();
    assert_eq!(exists, RespValue::Array(vec![RespValue::Integer(1)]));

    let result = ctx
        .execute(Command::EvalSha(EvalSha {
            sha1,
            num_keys: 0,
            keys: vec![],
            args: vec![],
        }))
        .await
        .unwrap();
    assert_eq!(result, RespValue::BulkString(Bytes::from_static(b"loaded")));
}

#[tokio::test]
async fn script_flush_clears_the_cache() {
    let ctx = TestContext::new().await;

    let sha1 = match ctx
        .execute(Command::Script(Script {
            subcommand: ScriptSubcommand::Load(Bytes::from_static(b"return 1")),
        }))
        .await
        .unwrap()
    {
        RespValue::BulkString(b) => String::from_utf8(b.to_vec()).unwrap(),
        other => panic!("expected bulk string sha1, got {other:?}"),
    };

    ctx.execute(Command::Script(Script {
        subcommand: ScriptSubcommand::Flush,
    }))
    .await
    .unwrap();

    let exists = ctx
        .execute(Command::Script(Script {
            subcommand: ScriptSubcommand::Exists(vec![sha1]),
        }))
        .await
        .unwrap();
    assert_eq!(exists, RespValue::Array(vec![RespValue::Integer(0)]));
}

// ===== OOM gate (spec.md §8 scenario 5) =====

#[tokio::test]
async fn deny_oom_write_is_refused_before_any_write_when_memory_is_over_cap() {
    let ctx = TestContext::new().await;
    // `Some(0)` reliably latches OOM regardless of the empty test db's actual
    // memory usage, simulating a server already over its configured cap.
    ctx.state.config.lock().await.maxmemory = Some(0);

    let result = ctx
        .execute(eval(
            "return spinel.call('set', KEYS[1], 'v')",
            vec!["k"],
            vec![],
        ))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn deny_oom_write_is_allowed_once_the_script_has_already_written() {
    let ctx = TestContext::new().await;
    // `Some(0)` reliably latches OOM regardless of the empty test db's actual
    // memory usage, simulating a server already over its configured cap.
    ctx.state.config.lock().await.maxmemory = Some(0);

    // DEL is a write but not DENY_OOM-flagged, so it dirties the script first;
    // the subsequent SET (DENY_OOM) must then be allowed to complete even
    // though the memory cap is still exceeded.
    let result = ctx
        .execute(eval(
            "spinel.call('del', KEYS[1]); return spinel.call('set', KEYS[1], 'v')",
            vec!["k"],
            vec![],
        ))
        .await
        .unwrap();

    // `spinel.call`'s simple-string reply becomes a plain Lua string, which the
    // final script-return conversion renders back out as a bulk string -- the
    // same collapsing Redis's own Lua bridge does for a returned status reply.
    assert_eq!(result, RespValue::BulkString(Bytes::from_static(b"OK")));
}

// ===== Administrative kill (spec.md §4.3, §8 scenarios 3-4) =====

#[tokio::test]
async fn kill_with_no_script_running_returns_not_busy() {
    let ctx = TestContext::new().await;
    let result = spineldb::core::scripting::kill(&ctx.state, true);
    assert!(matches!(result, Err(SpinelDBError::ScriptNotBusy)));
}

#[tokio::test]
async fn kill_succeeds_on_a_freshly_prepared_read_only_script() {
    let ctx = TestContext::new().await;
    let run_ctx = RunContext::new("eval".into(), true, 1, 0, None, false, false, false, None);
    let guard = ctx.state.script_runner.prepare(run_ctx).await;

    let result = spineldb::core::scripting::kill(&ctx.state, true);
    assert!(result.is_ok());
    assert!(guard.run_ctx().shared.is_set(RunFlags::KILLED));

    guard.reset(&ctx.state, &ctx.db).await;
}

#[tokio::test]
async fn kill_on_write_dirty_script_is_unkillable() {
    let ctx = TestContext::new().await;
    let run_ctx = RunContext::new("eval".into(), true, 1, 0, None, false, false, false, None);
    run_ctx.shared.set_flags(RunFlags::WRITE_DIRTY);
    let guard = ctx.state.script_runner.prepare(run_ctx).await;

    let result = spineldb::core::scripting::kill(&ctx.state, true);
    assert!(matches!(result, Err(SpinelDBError::ScriptUnkillable(_))));
    assert!(!guard.run_ctx().shared.is_set(RunFlags::KILLED));

    guard.reset(&ctx.state, &ctx.db).await;
}

#[tokio::test]
async fn kill_on_script_sent_by_the_upstream_master_is_unkillable() {
    let ctx = TestContext::new().await;
    let run_ctx = RunContext::new("eval".into(), true, 1, 0, None, false, true, false, None);
    let guard = ctx.state.script_runner.prepare(run_ctx).await;

    let result = spineldb::core::scripting::kill(&ctx.state, true);
    assert!(matches!(result, Err(SpinelDBError::ScriptUnkillable(_))));

    guard.reset(&ctx.state, &ctx.db).await;
}

#[tokio::test]
async fn kill_in_the_wrong_mode_reports_nothing_busy() {
    let ctx = TestContext::new().await;
    // The running script is eval-mode; a `FUNCTION KILL` (is_eval = false) must
    // not be able to touch it.
    let run_ctx = RunContext::new("eval".into(), true, 1, 0, None, false, false, false, None);
    let guard = ctx.state.script_runner.prepare(run_ctx).await;

    let result = spineldb::core::scripting::kill(&ctx.state, false);
    assert!(matches!(result, Err(SpinelDBError::ScriptWrongKillMode(_))));
    assert!(!guard.run_ctx().shared.is_set(RunFlags::KILLED));

    guard.reset(&ctx.state, &ctx.db).await;
}

#[tokio::test]
async fn reset_clears_the_running_singleton() {
    let ctx = TestContext::new().await;
    assert!(!ctx.state.script_runner.is_running());

    let run_ctx = RunContext::new("eval".into(), true, 1, 0, None, false, false, false, None);
    let guard = ctx.state.script_runner.prepare(run_ctx).await;
    assert!(ctx.state.script_runner.is_running());

    guard.reset(&ctx.state, &ctx.db).await;
    assert!(!ctx.state.script_runner.is_running());
    assert!(ctx.state.script_runner.current_function_name().is_none());
}
