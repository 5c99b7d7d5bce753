//! Stack frames
//!
//! A thread's frames replace the native call stack. Each frame runs one
//! branch (a sequence of blocks) and carries the lazily-initialized state of
//! the construct at its program counter. That state survives yields and loop
//! iterations and is cleared when the program counter moves on.

use super::clock::StackTimer;
use super::dispatch::CohortId;
use crate::project::{Block, Branch};

/// Where the construct at a frame's program counter is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructPhase {
    /// Not yet visited
    NotStarted,
    /// Visited and yielded without starting a branch (waits)
    Suspended,
    /// A child frame is running one of its branches
    InBranch,
    /// Its loop branch just completed; the construct decides whether to go again
    AwaitingIteration,
}

/// Execution frame - one per active branch
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// Blocks this frame is executing
    pub branch: Branch,

    /// Index of the current block in `branch`
    pub pc: usize,

    /// When this branch completes, re-enter the parent construct instead of
    /// moving past it
    pub is_loop: bool,

    /// Run without yielding between loop iterations
    pub warp_mode: bool,

    pub phase: ConstructPhase,

    /* ----- construct state, reset whenever `pc` moves ----- */
    pub loop_counter: Option<i64>,
    pub index: Option<f64>,
    pub timer: Option<StackTimer>,
    pub cohort: Option<CohortId>,
}

impl StackFrame {
    pub fn new(branch: Branch, is_loop: bool, warp_mode: bool) -> Self {
        Self {
            branch,
            pc: 0,
            is_loop,
            warp_mode,
            phase: ConstructPhase::NotStarted,
            loop_counter: None,
            index: None,
            timer: None,
            cohort: None,
        }
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.branch.get(self.pc)
    }

    /// Every block in the branch has run
    pub fn is_complete(&self) -> bool {
        self.pc >= self.branch.len()
    }

    /// Move to the next block, dropping the finished construct's state
    pub fn advance(&mut self) {
        self.pc += 1;
        self.reset_construct();
    }

    pub fn reset_construct(&mut self) {
        self.phase = ConstructPhase::NotStarted;
        self.loop_counter = None;
        self.index = None;
        self.timer = None;
        self.cohort = None;
    }
}
