//! Sequencer: the per-tick stepping loop
//!
//! ## Function Organization
//! 1. step_threads() - one tick: step every eligible thread once, then reap
//! 2. step_thread() - run one thread until it suspends or finishes
//! 3. execute_block() - evaluate arguments and call one primitive

use serde::Serialize;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, trace};

use super::dispatch::HatEvent;
use super::frame::ConstructPhase;
use super::lifecycle::LifecycleEvent;
use super::thread::ThreadStatus;
use super::util::{BlockUtility, Request, YieldKind};
use super::Runtime;
use crate::errors::BlockError;
use crate::project::Block;
use crate::value::Value;

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    /// Threads stepped this tick
    pub stepped: usize,
    /// Threads still alive after reaping
    pub active: usize,
    pub redraw_requested: bool,
}

/* ===================== Public API ===================== */

impl Runtime {
    /// Run one tick
    ///
    /// Threads are visited in registration order. Threads spawned or
    /// restarted during the tick wait for the next one; hats started by the
    /// step-start signal run in this tick.
    pub fn step_threads(&mut self) -> TickSummary {
        self.emit(LifecycleEvent::StepStart);
        self.every_other_frame();

        self.tick += 1;
        self.redraw_requested = false;

        let count = self.threads.len();
        let mut stepped = 0;

        for idx in 0..count {
            if idx >= self.threads.len() {
                break;
            }
            if self.ready_to_step(idx) {
                stepped += 1;
                self.step_thread(idx);
            }
        }

        self.reap_threads();

        let summary = TickSummary {
            tick: self.tick,
            stepped,
            active: self.active_thread_count(),
            redraw_requested: self.redraw_requested,
        };
        trace!(
            tick = summary.tick,
            stepped = summary.stepped,
            active = summary.active,
            "Tick complete"
        );
        summary
    }

    fn every_other_frame(&mut self) {
        if self.other_frame {
            self.start_hats(HatEvent::EveryOtherFrame, None);
        }
        self.other_frame = !self.other_frame;
    }

    /* ===================== Eligibility ===================== */

    fn ready_to_step(&mut self, idx: usize) -> bool {
        let tick = self.tick;
        let thread = &mut self.threads[idx];

        if thread.spawned_tick >= tick {
            return false;
        }

        let status = thread.status;
        match status {
            ThreadStatus::Running => true,
            ThreadStatus::Yielded => {
                thread.status = ThreadStatus::Running;
                true
            }
            ThreadStatus::YieldedTick if thread.yield_tick < tick => {
                thread.status = ThreadStatus::Running;
                true
            }
            ThreadStatus::YieldedTick => false,
            ThreadStatus::PromiseWait => self.poll_pending(idx),
            ThreadStatus::Done => false,
        }
    }

    /// Check a waiting thread's external result. A resolved result is stored,
    /// the waiting block completes and the thread becomes runnable.
    fn poll_pending(&mut self, idx: usize) -> bool {
        let thread = &mut self.threads[idx];

        let value = match thread.pending.as_mut().map(|p| p.rx.try_recv()) {
            None => Value::empty(),
            Some(Ok(Ok(value))) => value,
            Some(Ok(Err(error))) => {
                debug!(thread = %thread.id, error = %error, "Evaluation rejected");
                Value::empty()
            }
            Some(Err(TryRecvError::Empty)) => return false,
            Some(Err(TryRecvError::Closed)) => Value::empty(),
        };

        let store_in = thread.pending.take().and_then(|p| p.store_in);
        thread.status = ThreadStatus::Running;
        if let Some(frame) = thread.peek_stack_frame_mut() {
            frame.advance();
        }

        if let Some(name) = store_in {
            let target = thread.target;
            self.set_variable(target, &name, value);
        }
        true
    }

    /* ===================== Stepping ===================== */

    /// Run one thread until it yields, ends a loop iteration outside warp
    /// mode, waits on a result or finishes
    fn step_thread(&mut self, idx: usize) {
        let generation = self.threads[idx].generation;
        let mut warp_started: Option<f64> = None;

        loop {
            let thread = &mut self.threads[idx];
            if thread.status != ThreadStatus::Running || thread.generation != generation {
                return;
            }

            let Some(depth) = thread.frames.len().checked_sub(1) else {
                thread.status = ThreadStatus::Done;
                return;
            };

            /* ----- branch finished: return to the construct that started it ----- */
            if thread.frames[depth].is_complete() {
                let finished = thread.pop_stack();
                if thread.frames.is_empty() {
                    thread.status = ThreadStatus::Done;
                    debug!(thread = %thread.id, "Thread finished");
                    return;
                }

                let parent = &mut thread.frames[depth - 1];
                if finished.map_or(false, |f| f.is_loop) {
                    parent.phase = ConstructPhase::AwaitingIteration;
                    if !parent.warp_mode || self.warp_exceeded(&mut warp_started) {
                        self.threads[idx].status = ThreadStatus::Yielded;
                        return;
                    }
                } else {
                    parent.advance();
                }
                continue;
            }

            /* ----- execute the block at the program counter ----- */
            let branch = thread.frames[depth].branch.clone();
            let block = &branch[thread.frames[depth].pc];

            let request = match self.execute_block(idx, depth, block) {
                Ok(request) => request,
                Err(error) => {
                    self.record_error(idx, &block.opcode, &error);
                    return;
                }
            };

            let tick = self.tick;
            let thread = &mut self.threads[idx];
            if thread.status != ThreadStatus::Running || thread.generation != generation {
                return;
            }

            match request.yielded {
                Some(YieldKind::Tick) => {
                    // The tick boundary completes the block; it does not re-run.
                    if !request.branch_started {
                        thread.frames[depth].advance();
                    }
                    thread.status = ThreadStatus::YieldedTick;
                    thread.yield_tick = tick;
                    return;
                }
                Some(YieldKind::Normal) => {
                    if !request.branch_started {
                        thread.frames[depth].phase = ConstructPhase::Suspended;
                    }
                    let warp = thread.peek_stack_frame().map_or(false, |f| f.warp_mode);
                    if warp && !self.warp_exceeded(&mut warp_started) {
                        continue;
                    }
                    self.threads[idx].status = ThreadStatus::Yielded;
                    return;
                }
                None if request.branch_started => {}
                None => thread.frames[depth].advance(),
            }
        }
    }

    /// Evaluate `block`'s arguments and run its primitive
    fn execute_block(&mut self, idx: usize, depth: usize, block: &Block) -> Result<Request, BlockError> {
        let primitive = self
            .primitives
            .get(&block.opcode)
            .ok_or_else(|| BlockError::UnknownOpcode(block.opcode.clone()))?;

        let mut util = BlockUtility::new(self, idx, depth, block);
        let args = util.evaluate_args(block)?;
        primitive(&args, &mut util)?;

        Ok(util.request())
    }

    /// Whether the warp budget of the current step is spent. The budget
    /// starts the first time this is asked.
    fn warp_exceeded(&self, started: &mut Option<f64>) -> bool {
        let now = self.now_ms();
        let start = *started.get_or_insert(now);
        now - start > self.config.warp_time_ms as f64
    }

    /* ===================== Reaping ===================== */

    /// Drop finished threads and any cohort nobody waits on anymore
    fn reap_threads(&mut self) {
        let before = self.threads.len();
        self.threads.retain(|t| !t.is_done());

        let threads = &self.threads;
        self.cohorts.retain(|id, cohort| {
            threads
                .iter()
                .any(|t| t.id == cohort.owner && t.frames.iter().any(|f| f.cohort == Some(*id)))
        });

        let reaped = before - self.threads.len();
        if reaped > 0 {
            trace!(reaped, "Threads reaped");
        }
    }
}
