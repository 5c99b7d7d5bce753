//! Control blocks: loops, waits, conditionals, stops, clones and the counter

use tracing::debug;

use super::{Args, Primitive};
use crate::errors::BlockError;
use crate::runtime::BlockUtility;
use crate::value::{self, Value};

type BlockResult = Result<Option<Value>, BlockError>;

pub fn primitives() -> Vec<(&'static str, Primitive)> {
    vec![
        ("control_repeat", repeat as Primitive),
        ("control_repeat_until", repeat_until),
        ("control_while", repeat_while),
        ("control_for_each", for_each),
        ("control_forever", forever),
        ("control_wait", wait),
        ("control_repeatForSeconds", repeat_for_seconds),
        ("control_waittick", wait_tick),
        ("control_wait_until", wait_until),
        ("control_waitsecondsoruntil", wait_or_until),
        ("control_if", if_then),
        ("control_if_else", if_else),
        ("control_if_return_else_return", if_return_else_return),
        ("control_stop", stop),
        ("control_stop_sprite", stop_sprite),
        ("control_create_clone_of", create_clone),
        ("control_delete_this_clone", delete_this_clone),
        ("control_delete_clones_of", delete_clones_of),
        ("control_get_counter", get_counter),
        ("control_set_counter", set_counter),
        ("control_incr_counter", incr_counter),
        ("control_decr_counter", decr_counter),
        ("control_clear_counter", clear_counter),
        ("control_all_at_once", all_at_once),
        ("control_backToGreenFlag", back_to_green_flag),
        ("control_javascript_command", javascript_command),
    ]
}

/* ===================== Loops ===================== */

fn repeat(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let times = value::round(args.number("TIMES"));
    let frame = util.stack_frame();

    // Saturating cast: NaN becomes 0, infinities clamp to the i64 range.
    let counter = frame.loop_counter.get_or_insert(times as i64);
    *counter = counter.saturating_sub(1);

    if *counter >= 0 {
        util.start_branch(1, true);
    }
    Ok(None)
}

fn repeat_until(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if !args.boolean("CONDITION") {
        util.start_branch(1, true);
    }
    Ok(None)
}

fn repeat_while(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if args.boolean("CONDITION") {
        util.start_branch(1, true);
    }
    Ok(None)
}

fn for_each(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let limit = args.number("VALUE");
    let variable = args.string("VARIABLE");

    let index = util.stack_frame().index.get_or_insert(0.0);
    if *index < limit {
        *index += 1.0;
        let current = *index;
        util.set_variable(&variable, Value::Num(current));
        util.start_branch(1, true);
    }
    Ok(None)
}

fn forever(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.start_branch(1, true);
    Ok(None)
}

fn repeat_for_seconds(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if util.stack_timer_needs_init() {
        util.start_stack_timer(1000.0 * args.number("TIMES"));
        util.request_redraw();
    } else if util.stack_timer_finished() {
        return Ok(None);
    }

    util.start_branch(1, true);
    util.yield_now();
    Ok(None)
}

/* ===================== Waits ===================== */

fn wait(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if util.stack_timer_needs_init() {
        util.start_stack_timer(1000.0 * args.number("DURATION"));
        util.request_redraw();
        util.yield_now();
    } else if !util.stack_timer_finished() {
        util.yield_now();
    }
    Ok(None)
}

fn wait_tick(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.yield_tick();
    Ok(None)
}

fn wait_until(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if !args.boolean("CONDITION") {
        util.yield_now();
    }
    Ok(None)
}

fn wait_or_until(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if args.boolean("CONDITION") {
        return Ok(None);
    }

    if util.stack_timer_needs_init() {
        util.start_stack_timer(1000.0 * args.number("DURATION"));
        util.request_redraw();
        util.yield_now();
    } else if !util.stack_timer_finished() {
        util.yield_now();
    }
    Ok(None)
}

/* ===================== Conditionals ===================== */

fn if_then(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if args.boolean("CONDITION") {
        util.start_branch(1, false);
    }
    Ok(None)
}

fn if_else(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let branch = if args.boolean("CONDITION") { 1 } else { 2 };
    util.start_branch(branch, false);
    Ok(None)
}

fn if_return_else_return(args: &Args, _util: &mut BlockUtility<'_>) -> BlockResult {
    let chosen = if args.boolean("BOOLEAN") { "TEXT1" } else { "TEXT2" };
    Ok(Some(args.value(chosen)))
}

/* ===================== Stopping ===================== */

fn stop(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    match args.string("STOP_OPTION").as_str() {
        "all" => util.stop_all(),
        "other scripts in sprite" | "other scripts in stage" => util.stop_other_target_threads(),
        "this script" => util.stop_this_script(),
        other => debug!(option = other, "Unknown stop option"),
    }
    Ok(None)
}

fn stop_sprite(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let selector = args.string("STOP_OPTION");
    let caller = util.target_id();

    if let Some(target) = util.runtime().resolve_sprite(&selector, caller) {
        util.runtime().stop_for_target(target, None);
    }
    Ok(None)
}

/* ===================== Clones ===================== */

fn create_clone(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let selector = args.string("CLONE_OPTION");
    let caller = util.target_id();

    let source = util.runtime().resolve_sprite(&selector, caller);

    if let Some(source) = source {
        util.runtime().create_clone(source);
    }
    Ok(None)
}

fn delete_this_clone(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let target = util.target_id();
    util.runtime().delete_clone(target);
    Ok(None)
}

fn delete_clones_of(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let selector = args.string("CLONE_OPTION");
    let caller = util.target_id();

    let source = util.runtime().resolve_sprite(&selector, caller);

    if let Some(source) = source {
        util.runtime().delete_clones_of(source);
    }
    Ok(None)
}

/* ===================== Counter ===================== */

fn get_counter(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(Value::Num(util.runtime().counter())))
}

fn set_counter(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.runtime().set_counter(args.number("VALUE"));
    Ok(None)
}

fn incr_counter(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let runtime = util.runtime();
    runtime.set_counter(runtime.counter() + 1.0);
    Ok(None)
}

fn decr_counter(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let runtime = util.runtime();
    runtime.set_counter(runtime.counter() - 1.0);
    Ok(None)
}

fn clear_counter(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.runtime().set_counter(0.0);
    Ok(None)
}

/* ===================== Execution ===================== */

/// Run branch 1 in warp mode; this frame keeps its own mode
fn all_at_once(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.start_branch(1, false);
    if let Some(child) = util.thread_mut().peek_stack_frame_mut() {
        child.warp_mode = true;
    }
    Ok(None)
}

fn back_to_green_flag(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let keep = util.thread().top_block.clone();
    util.runtime().reset_to_green_flag(&keep);
    Ok(None)
}

/// Hand source text to the evaluator and wait for its answer
fn javascript_command(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.require_suspendable()?;
    let source = args.string("JS");
    let store_in = args
        .get("RESULT")
        .map(value::to_string)
        .filter(|name| !name.is_empty());

    let rx = util.runtime().evaluator.execute(&source);
    util.await_result(rx, store_in)?;
    Ok(None)
}
