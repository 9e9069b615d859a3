// tests/unit_script_run_context_test.rs

//! Unit tests for the per-invocation scripting state bundle: flags, the
//! pseudo-client capability surface, and the OOM latch. None of this needs a
//! running server -- `RunContext::new` has no dependency on `ServerState`.

use spineldb::core::scripting::{RunContext, RunFlags};

fn new_ctx(is_eval: bool, oom_latched: bool) -> RunContext {
    RunContext::new(
        "eval".to_string(),
        is_eval,
        1,
        0,
        None,
        false,
        false,
        oom_latched,
        None,
    )
}

#[test]
fn eval_mode_flag_set_for_ad_hoc_scripts() {
    let ctx = new_ctx(true, false);
    assert!(ctx.shared.is_eval());
    assert!(ctx.shared.is_set(RunFlags::EVAL_MODE));
}

#[test]
fn eval_mode_flag_clear_for_non_eval_invocations() {
    let ctx = new_ctx(false, false);
    assert!(!ctx.shared.is_eval());
}

#[test]
fn fresh_context_has_no_write_dirty_or_multi_emitted() {
    let ctx = new_ctx(true, false);
    assert!(!ctx.shared.is_set(RunFlags::WRITE_DIRTY));
    assert!(!ctx.shared.is_set(RunFlags::MULTI_EMITTED));
    assert!(!ctx.shared.is_set(RunFlags::TIMEDOUT));
    assert!(!ctx.shared.is_set(RunFlags::KILLED));
}

#[test]
fn oom_latched_is_captured_verbatim_from_prepare_time() {
    assert!(new_ctx(true, true).oom_latched);
    assert!(!new_ctx(true, false).oom_latched);
}

#[test]
fn set_protocol_version_accepts_resp2_and_resp3() {
    let mut ctx = new_ctx(true, false);
    assert_eq!(ctx.pseudo_client.protocol_version, 2);
    ctx.pseudo_client.set_protocol_version(3).unwrap();
    assert_eq!(ctx.pseudo_client.protocol_version, 3);
    ctx.pseudo_client.set_protocol_version(2).unwrap();
    assert_eq!(ctx.pseudo_client.protocol_version, 2);
}

#[test]
fn set_protocol_version_rejects_anything_else() {
    let mut ctx = new_ctx(true, false);
    assert!(ctx.pseudo_client.set_protocol_version(4).is_err());
    assert!(ctx.pseudo_client.set_protocol_version(0).is_err());
    // Rejecting the bad version must not mutate the existing value.
    assert_eq!(ctx.pseudo_client.protocol_version, 2);
}

#[test]
fn write_dirty_then_kill_flag_are_independent_bits() {
    let ctx = new_ctx(true, false);
    ctx.shared.set_flags(RunFlags::WRITE_DIRTY);
    ctx.shared.set_flags(RunFlags::KILLED);
    assert!(ctx.shared.is_set(RunFlags::WRITE_DIRTY));
    assert!(ctx.shared.is_set(RunFlags::KILLED));

    ctx.shared.clear_flags(RunFlags::KILLED);
    assert!(ctx.shared.is_set(RunFlags::WRITE_DIRTY));
    assert!(!ctx.shared.is_set(RunFlags::KILLED));
}

#[test]
fn run_duration_is_monotonically_non_decreasing() {
    let ctx = new_ctx(true, false);
    let first = ctx.shared.run_duration_ms();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = ctx.shared.run_duration_ms();
    assert!(second >= first);
}
