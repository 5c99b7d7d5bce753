//! Event blocks: broadcasts, broadcast-and-wait and broadcast functions

use super::{Args, Primitive};
use crate::errors::BlockError;
use crate::runtime::BlockUtility;
use crate::value::Value;

type BlockResult = Result<Option<Value>, BlockError>;

pub fn primitives() -> Vec<(&'static str, Primitive)> {
    vec![
        ("event_broadcast", broadcast as Primitive),
        ("event_broadcast_with_data", broadcast_with_data),
        ("event_broadcast_to_sprite", broadcast_to_sprite),
        ("event_broadcastandwait", broadcast_and_wait),
        ("event_broadcast_function", broadcast_function),
        ("event_broadcast_function_args", broadcast_function_args),
        ("event_return_from_broadcast", return_from_broadcast),
        ("event_broadcast_thread_count", broadcast_thread_count),
        ("event_is_broadcast_received", is_broadcast_received),
        ("event_received_data", received_data),
    ]
}

/* ===================== Fire and Forget ===================== */

fn broadcast(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.broadcast(&args.string("BROADCAST"), None, None);
    Ok(None)
}

fn broadcast_with_data(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.broadcast(&args.string("BROADCAST"), Some(args.value("DATA")), None);
    Ok(None)
}

/// Only the selected sprite (or the stage) hears it. An unknown sprite still
/// counts as sent.
fn broadcast_to_sprite(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let name = args.string("BROADCAST");
    let caller = util.target_id();
    let scope = util.runtime().resolve_sprite(&args.string("SPRITE"), caller);

    match scope {
        Some(target) => {
            util.broadcast(&name, None, Some(target));
        }
        None => util.runtime().mark_sent(&name),
    }
    Ok(None)
}

fn broadcast_thread_count(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let started = util.broadcast(&args.string("BROADCAST"), None, None);
    Ok(Some(Value::Num(started.len() as f64)))
}

/* ===================== Broadcast and Wait ===================== */

enum Waiting {
    Pending,
    Finished(Option<Value>),
}

/// Dispatch on the first visit, then yield every visit until every thread
/// that was started is done
fn await_broadcast(util: &mut BlockUtility<'_>, name: &str, payload: Option<Value>) -> Waiting {
    let cohort = util.stack_frame().cohort;
    match cohort {
        None => {
            let (owner, generation) = (util.thread_id(), util.thread().generation);
            let started = util.broadcast(name, payload, None);

            // Hearing our own broadcast restarts us; this frame is gone.
            if util.thread().generation != generation {
                return Waiting::Pending;
            }
            if started.is_empty() {
                return Waiting::Finished(None);
            }

            let cohort = util.runtime().open_cohort(owner, &started);
            util.stack_frame().cohort = Some(cohort);
            util.yield_now();
            Waiting::Pending
        }
        Some(cohort) if util.runtime().cohort_finished(cohort) => {
            Waiting::Finished(util.runtime().close_cohort(cohort))
        }
        Some(_) => {
            util.yield_now();
            Waiting::Pending
        }
    }
}

fn broadcast_and_wait(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    util.require_suspendable()?;
    await_broadcast(util, &args.string("BROADCAST"), None);
    Ok(None)
}

fn broadcast_function(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    call_broadcast(args, util, None)
}

fn broadcast_function_args(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    call_broadcast(args, util, Some(args.value("DATA")))
}

/// Broadcast-and-wait whose listeners can answer. The answer (or the empty
/// string) lands in the RESULT variable.
fn call_broadcast(args: &Args, util: &mut BlockUtility<'_>, payload: Option<Value>) -> BlockResult {
    util.require_suspendable()?;
    if let Waiting::Finished(answer) = await_broadcast(util, &args.string("BROADCAST"), payload) {
        let store_in = args.string("RESULT");
        if !store_in.is_empty() {
            util.set_variable(&store_in, answer.unwrap_or_default());
        }
    }
    Ok(None)
}

/// Record the answer for the broadcast function that started this thread.
/// The script keeps running; the caller reads the value once every listener
/// is done.
fn return_from_broadcast(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    if let Some(cohort) = util.thread().cohort {
        util.runtime().set_cohort_return(cohort, args.value("VALUE"));
    }
    Ok(None)
}

/* ===================== Reporters ===================== */

fn is_broadcast_received(args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    let received = util.runtime().is_broadcast_received(&args.string("BROADCAST"));
    Ok(Some(Value::Bool(received)))
}

fn received_data(_args: &Args, util: &mut BlockUtility<'_>) -> BlockResult {
    Ok(Some(util.thread().received_data.clone().unwrap_or_default()))
}
