//! Threads: one resumable execution of a script

use serde::Serialize;
use std::fmt;
use tokio::sync::oneshot;

use super::dispatch::CohortId;
use super::entity::EntityId;
use super::frame::StackFrame;
use crate::errors::EvalError;
use crate::project::{Branch, Script, ScriptId};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Eligible to step
    Running,
    /// Re-executes its current block on the next step
    Yielded,
    /// Waits until a later tick, even in warp mode
    YieldedTick,
    /// Waits for an external result
    PromiseWait,
    /// Finished or stopped; reaped at the end of the tick
    Done,
}

/// External result a thread is waiting on
#[derive(Debug)]
pub struct PendingResult {
    pub rx: oneshot::Receiver<Result<Value, EvalError>>,
    /// Variable that receives the resolved value
    pub store_in: Option<String>,
}

#[derive(Debug)]
pub struct Thread {
    pub id: ThreadId,
    pub target: EntityId,
    pub top_block: ScriptId,
    pub frames: Vec<StackFrame>,
    pub status: ThreadStatus,

    /// Payload of the broadcast that started this thread
    pub received_data: Option<Value>,
    /// Broadcast-and-wait cohort this thread reports back to
    pub cohort: Option<CohortId>,

    pub(crate) pending: Option<PendingResult>,
    pub(crate) spawned_tick: u64,
    pub(crate) yield_tick: u64,
    /// Bumped on every restart so a step in progress can tell it was replaced
    pub(crate) generation: u64,

    body: Branch,
}

impl Thread {
    pub(crate) fn new(id: ThreadId, target: EntityId, script: &Script, tick: u64) -> Self {
        let mut thread = Self {
            id,
            target,
            top_block: script.id.clone(),
            frames: Vec::new(),
            status: ThreadStatus::Running,
            received_data: None,
            cohort: None,
            pending: None,
            spawned_tick: tick,
            yield_tick: 0,
            generation: 0,
            body: script.body.clone(),
        };
        thread.push_stack(StackFrame::new(script.body.clone(), false, false));
        thread
    }

    pub fn is_done(&self) -> bool {
        self.status == ThreadStatus::Done
    }

    pub fn peek_stack_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub fn peek_stack_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    pub fn push_stack(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    pub fn pop_stack(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// End this thread now; its frames are reclaimed immediately
    pub fn stop_this_script(&mut self) {
        self.frames.clear();
        self.pending = None;
        self.status = ThreadStatus::Done;
    }

    /// Start the script over from its top block
    pub(crate) fn restart(&mut self, tick: u64) {
        self.frames.clear();
        self.push_stack(StackFrame::new(self.body.clone(), false, false));
        self.status = ThreadStatus::Running;
        self.received_data = None;
        self.cohort = None;
        self.pending = None;
        self.spawned_tick = tick;
        self.generation += 1;
    }
}
