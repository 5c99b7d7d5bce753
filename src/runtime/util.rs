//! The capability handed to block primitives
//!
//! A primitive never touches the frame stack or the thread status directly.
//! It records requests (yield, start a branch) on the utility, which the
//! sequencer applies once the primitive returns. Stops take effect at once.

use tokio::sync::oneshot;

use super::clock::StackTimer;
use super::dispatch::HatEvent;
use super::entity::{Entity, EntityId};
use super::frame::{ConstructPhase, StackFrame};
use super::thread::{PendingResult, Thread, ThreadId, ThreadStatus};
use super::Runtime;
use crate::blocks::Args;
use crate::errors::{BlockError, EvalError};
use crate::project::{empty_branch, Block, Input};
use crate::value::Value;

/// How a primitive asked to suspend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldKind {
    /// Until the next step; skipped in warp mode while the warp budget lasts
    Normal,
    /// Until a later tick, even in warp mode
    Tick,
}

/// What the last primitive asked the sequencer to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Request {
    pub yielded: Option<YieldKind>,
    pub branch_started: bool,
}

pub struct BlockUtility<'a> {
    runtime: &'a mut Runtime,
    thread_idx: usize,
    frame_depth: usize,
    block: &'a Block,
    request: Request,
    /// Evaluating a reporter input: branches cannot start
    reporting: bool,
}

impl<'a> BlockUtility<'a> {
    pub(crate) fn new(
        runtime: &'a mut Runtime,
        thread_idx: usize,
        frame_depth: usize,
        block: &'a Block,
    ) -> Self {
        Self {
            runtime,
            thread_idx,
            frame_depth,
            block,
            request: Request::default(),
            reporting: false,
        }
    }

    pub(crate) fn request(&self) -> Request {
        self.request
    }

    pub fn runtime(&mut self) -> &mut Runtime {
        self.runtime
    }

    pub fn block(&self) -> &Block {
        self.block
    }

    pub fn thread(&self) -> &Thread {
        &self.runtime.threads[self.thread_idx]
    }

    pub fn thread_mut(&mut self) -> &mut Thread {
        &mut self.runtime.threads[self.thread_idx]
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread().id
    }

    pub fn target_id(&self) -> EntityId {
        self.thread().target
    }

    pub fn target(&self) -> Option<&Entity> {
        self.runtime.entity(self.target_id())
    }

    /// The frame executing this block
    pub fn stack_frame(&mut self) -> &mut StackFrame {
        let depth = self.frame_depth;
        &mut self.thread_mut().frames[depth]
    }

    /* ===================== Scheduling Requests ===================== */

    /// Push a frame for branch `n` (1-based) and run it next. A missing
    /// branch runs as an empty one. The child inherits this frame's warp mode.
    pub fn start_branch(&mut self, n: usize, is_loop: bool) {
        if self.reporting {
            return;
        }
        let branch = self.block.get_branch(n).cloned().unwrap_or_else(empty_branch);
        let frame = self.stack_frame();
        frame.phase = ConstructPhase::InBranch;
        let warp_mode = frame.warp_mode;

        self.thread_mut()
            .push_stack(StackFrame::new(branch, is_loop, warp_mode));
        self.request.branch_started = true;
    }

    pub fn yield_now(&mut self) {
        self.request.yielded = Some(YieldKind::Normal);
    }

    pub fn yield_tick(&mut self) {
        self.request.yielded = Some(YieldKind::Tick);
    }

    pub fn stack_timer_needs_init(&mut self) -> bool {
        self.stack_frame().timer.is_none()
    }

    pub fn start_stack_timer(&mut self, duration_ms: f64) {
        let now = self.runtime.now_ms();
        self.stack_frame().timer = Some(StackTimer::start(now, duration_ms.max(0.0)));
    }

    pub fn stack_timer_finished(&mut self) -> bool {
        let now = self.runtime.now_ms();
        self.stack_frame().timer.map_or(true, |t| t.finished(now))
    }

    pub fn request_redraw(&mut self) {
        self.runtime.request_redraw();
    }

    /// Fails when this block is being evaluated as a reporter input.
    /// Primitives that wait on other threads or on the evaluator call this
    /// before doing anything with side effects.
    pub fn require_suspendable(&self) -> Result<(), BlockError> {
        if self.reporting {
            return Err(BlockError::failed(
                self.block.opcode.clone(),
                "cannot wait inside a reporter input",
            ));
        }
        Ok(())
    }

    /// Park the thread until `rx` resolves; the value goes into `store_in`.
    /// Fails inside a reporter input, where the thread cannot park.
    pub fn await_result(
        &mut self,
        rx: oneshot::Receiver<Result<Value, EvalError>>,
        store_in: Option<String>,
    ) -> Result<(), BlockError> {
        self.require_suspendable()?;
        let thread = self.thread_mut();
        thread.pending = Some(PendingResult { rx, store_in });
        thread.status = ThreadStatus::PromiseWait;
        Ok(())
    }

    /* ===================== Stopping ===================== */

    /// Stop every thread, this one included
    pub fn stop_all(&mut self) {
        self.runtime.stop_all();
    }

    /// Stop the other threads on this thread's entity
    pub fn stop_other_target_threads(&mut self) {
        let (target, me) = (self.target_id(), self.thread_id());
        self.runtime.stop_for_target(target, Some(me));
    }

    pub fn stop_this_script(&mut self) {
        self.thread_mut().stop_this_script();
    }

    /* ===================== Runtime Access ===================== */

    pub fn start_hats(&mut self, event: HatEvent<'_>, scope: Option<EntityId>) -> Vec<ThreadId> {
        self.runtime.start_hats(event, scope)
    }

    pub fn broadcast(
        &mut self,
        name: &str,
        payload: Option<Value>,
        scope: Option<EntityId>,
    ) -> Vec<ThreadId> {
        self.runtime.broadcast(name, payload, scope)
    }

    pub fn variable(&self, name: &str) -> Value {
        self.runtime
            .variable(self.target_id(), name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        let target = self.target_id();
        self.runtime.set_variable(target, name, value);
    }

    /* ===================== Argument Evaluation ===================== */

    /// Evaluate a block's fields and inputs. Fields come first so an input of
    /// the same name wins.
    pub(crate) fn evaluate_args(&mut self, block: &Block) -> Result<Args, BlockError> {
        let mut args = Args::new();

        for (name, field) in &block.fields {
            args.insert(name.clone(), Value::Str(field.clone()));
        }

        for (name, input) in &block.inputs {
            let value = match input {
                Input::Literal(value) => value.clone(),
                Input::Variable { var } => self.variable(var),
                Input::Reporter { block } => self.report(block)?,
            };
            args.insert(name.clone(), value);
        }

        Ok(args)
    }

    /// Run a reporter block to completion. Reporters cannot suspend, so any
    /// yield or branch it asks for is dropped.
    fn report(&mut self, block: &Block) -> Result<Value, BlockError> {
        let primitive = self
            .runtime
            .primitives
            .get(&block.opcode)
            .ok_or_else(|| BlockError::UnknownOpcode(block.opcode.clone()))?;

        let mut nested =
            BlockUtility::new(&mut *self.runtime, self.thread_idx, self.frame_depth, block);
        nested.reporting = true;
        let args = nested.evaluate_args(block)?;
        let value = primitive(&args, &mut nested)?;

        Ok(value.unwrap_or_default())
    }
}
