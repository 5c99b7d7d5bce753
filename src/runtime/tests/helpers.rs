//! Test helpers for runtime tests
//!
//! Small block constructors, a harness that owns a runtime driven by a
//! [`ManualClock`], and fake collaborators.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::config::SchedulerConfig;
use crate::errors::EvalError;
use crate::project::{Block, Hat, Project, Script, TargetDef};
use crate::runtime::{Clock, EntityId, Evaluator, ManualClock, Runtime, ThreadId, TickSummary};
use crate::value::Value;

/* ===================== Harness ===================== */

pub struct Harness {
    pub runtime: Runtime,
    pub clock: Arc<ManualClock>,
}

/// Load `targets` into a fresh runtime with default settings. A bare stage is
/// added when none is given.
pub fn harness(targets: Vec<TargetDef>) -> Harness {
    harness_with(SchedulerConfig::default(), targets)
}

pub fn harness_with(config: SchedulerConfig, targets: Vec<TargetDef>) -> Harness {
    build(config, None, targets)
}

pub fn harness_with_evaluator(
    targets: Vec<TargetDef>,
    evaluator: impl Evaluator + 'static,
) -> Harness {
    build(SchedulerConfig::default(), Some(Box::new(evaluator)), targets)
}

fn build(
    config: SchedulerConfig,
    evaluator: Option<Box<dyn Evaluator>>,
    mut targets: Vec<TargetDef>,
) -> Harness {
    let clock = Arc::new(ManualClock::new());
    let mut runtime = Runtime::new(config, clock.clone());
    if let Some(evaluator) = evaluator {
        runtime = runtime.with_evaluator(evaluator);
    }

    if !targets.iter().any(|t| t.is_stage) {
        targets.insert(0, TargetDef::stage(vec![]));
    }
    runtime.load_project(&Project { targets });

    Harness { runtime, clock }
}

impl Harness {
    pub fn green_flag(&mut self) -> Vec<ThreadId> {
        self.runtime.green_flag()
    }

    pub fn tick(&mut self) -> TickSummary {
        self.runtime.step_threads()
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.runtime.step_threads();
        }
    }

    /// Entity id by name; "Stage" is the stage
    pub fn id(&self, name: &str) -> EntityId {
        if name == "Stage" {
            return self.runtime.stage().expect("stage").id;
        }
        self.runtime
            .find_entity_by_name(name)
            .unwrap_or_else(|| panic!("no sprite named {name}"))
            .id
    }

    /// A variable as `target` sees it (empty string when unset)
    pub fn var(&self, target: &str, name: &str) -> Value {
        self.runtime
            .variable(self.id(target), name)
            .cloned()
            .unwrap_or_default()
    }

    /// A stage (global) variable
    pub fn global(&self, name: &str) -> Value {
        self.var("Stage", name)
    }
}

/* ===================== Scripts ===================== */

pub fn flag(id: &str, body: Vec<Block>) -> Script {
    Script::new(id, Hat::Flag, body)
}

pub fn on_broadcast(id: &str, message: &str, body: Vec<Block>) -> Script {
    Script::new(
        id,
        Hat::Broadcast {
            name: message.to_string(),
        },
        body,
    )
}

pub fn on_clone(id: &str, body: Vec<Block>) -> Script {
    Script::new(id, Hat::CloneStart, body)
}

/* ===================== Blocks ===================== */

pub fn set_var(name: &str, value: impl Into<Value>) -> Block {
    Block::new("data_setvariableto")
        .field("VARIABLE", name)
        .input("VALUE", value)
}

/// `set name to (reporter)`
pub fn set_var_to(name: &str, reporter: Block) -> Block {
    Block::new("data_setvariableto")
        .field("VARIABLE", name)
        .reporter("VALUE", reporter)
}

pub fn change_var(name: &str, by: f64) -> Block {
    Block::new("data_changevariableby")
        .field("VARIABLE", name)
        .input("VALUE", by)
}

pub fn var(name: &str) -> Block {
    Block::new("data_variable").field("VARIABLE", name)
}

pub fn repeat(times: f64, body: Vec<Block>) -> Block {
    Block::new("control_repeat").input("TIMES", times).branch(body)
}

pub fn forever(body: Vec<Block>) -> Block {
    Block::new("control_forever").branch(body)
}

pub fn wait(seconds: f64) -> Block {
    Block::new("control_wait").input("DURATION", seconds)
}

pub fn wait_tick() -> Block {
    Block::new("control_waittick")
}

pub fn broadcast(message: &str) -> Block {
    Block::new("event_broadcast").input("BROADCAST", message)
}

/// `(name) = (value)`
pub fn var_equals(name: &str, value: impl Into<Value>) -> Block {
    Block::new("operator_equals")
        .var_input("OPERAND1", name)
        .input("OPERAND2", value)
}

/* ===================== Collaborators ===================== */

/// Answers every request immediately with the same result
pub struct FixedEvaluator(pub Result<Value, EvalError>);

impl Evaluator for FixedEvaluator {
    fn execute(&self, _source: &str) -> oneshot::Receiver<Result<Value, EvalError>> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(self.0.clone());
        rx
    }
}

pub type EvalRequests = Rc<RefCell<Vec<(String, oneshot::Sender<Result<Value, EvalError>>)>>>;

/// Holds every request until the test answers it
#[derive(Default, Clone)]
pub struct DeferredEvaluator {
    pub requests: EvalRequests,
}

impl Evaluator for DeferredEvaluator {
    fn execute(&self, source: &str) -> oneshot::Receiver<Result<Value, EvalError>> {
        let (tx, rx) = oneshot::channel();
        self.requests.borrow_mut().push((source.to_string(), tx));
        rx
    }
}

/// Moves forward by a fixed step every time it is read
pub struct SteppingClock {
    micros: AtomicU64,
    step_micros: u64,
}

impl SteppingClock {
    pub fn new(step_ms: u64) -> Self {
        Self {
            micros: AtomicU64::new(0),
            step_micros: step_ms * 1000,
        }
    }
}

impl Clock for SteppingClock {
    fn now_ms(&self) -> f64 {
        self.micros.fetch_add(self.step_micros, Ordering::SeqCst) as f64 / 1000.0
    }
}
