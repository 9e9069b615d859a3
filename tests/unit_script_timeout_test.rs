// tests/unit_script_timeout_test.rs

//! Unit tests for the cooperative interrupt tick (`core::scripting::timeout`).
//! Exercises the three-way CONTINUE / transition-to-TIMEDOUT / KILL algorithm
//! from spec without needing a running server.

use spineldb::core::scripting::{InterruptAction, RunContext, RunFlags, interrupt};
use std::time::Duration;

fn new_ctx() -> RunContext {
    RunContext::new(
        "eval".to_string(),
        true,
        1,
        0,
        None,
        false,
        false,
        false,
        None,
    )
}

#[test]
fn continues_while_below_threshold() {
    let ctx = new_ctx();
    let action = interrupt(&ctx.shared, Duration::from_secs(3600));
    assert_eq!(action, InterruptAction::Continue);
    assert!(!ctx.shared.is_set(RunFlags::TIMEDOUT));
}

#[test]
fn zero_threshold_disables_the_timeout_check_entirely() {
    let ctx = new_ctx();
    std::thread::sleep(Duration::from_millis(5));
    let action = interrupt(&ctx.shared, Duration::ZERO);
    assert_eq!(action, InterruptAction::Continue);
    assert!(!ctx.shared.is_set(RunFlags::TIMEDOUT));
}

#[test]
fn crossing_the_threshold_transitions_to_timed_out_and_continues_if_not_killed() {
    let ctx = new_ctx();
    std::thread::sleep(Duration::from_millis(10));
    let action = interrupt(&ctx.shared, Duration::from_millis(1));
    assert_eq!(action, InterruptAction::Continue);
    assert!(ctx.shared.is_set(RunFlags::TIMEDOUT));
}

#[test]
fn once_timed_out_further_polls_never_recheck_the_threshold() {
    let ctx = new_ctx();
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(
        interrupt(&ctx.shared, Duration::from_millis(1)),
        InterruptAction::Continue
    );
    assert!(ctx.shared.is_set(RunFlags::TIMEDOUT));

    // Even with an enormous threshold, a timed-out run stays timed-out; the
    // polling question becomes purely "has KILLED been set since".
    assert_eq!(
        interrupt(&ctx.shared, Duration::from_secs(3600)),
        InterruptAction::Continue
    );
}

#[test]
fn killed_while_timed_out_is_observed_at_the_next_interrupt_tick() {
    let ctx = new_ctx();
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(
        interrupt(&ctx.shared, Duration::from_millis(1)),
        InterruptAction::Continue
    );
    assert!(ctx.shared.is_set(RunFlags::TIMEDOUT));

    // Simulates an administrative `SCRIPT KILL` flipping the bit from another task.
    ctx.shared.set_flags(RunFlags::KILLED);

    assert_eq!(
        interrupt(&ctx.shared, Duration::from_millis(1)),
        InterruptAction::Kill
    );
}

#[test]
fn killed_before_threshold_crossed_has_no_effect_until_timed_out() {
    let ctx = new_ctx();
    ctx.shared.set_flags(RunFlags::KILLED);
    // Still below threshold: KILLED is only consulted once TIMEDOUT is set.
    assert_eq!(
        interrupt(&ctx.shared, Duration::from_secs(3600)),
        InterruptAction::Continue
    );
}
