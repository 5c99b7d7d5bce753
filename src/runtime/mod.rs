//! # Runtime - Cooperative Tick Scheduler
//!
//! ## Core Principles
//!
//! 1. **Frame-stack execution**: every thread keeps its state in `frames: Vec<StackFrame>`;
//!    control constructs never recurse on the native stack
//! 2. **One pass per tick**: `step_threads()` visits threads in registration order
//! 3. **Requests, not control**: block primitives ask for yields, branches and stops
//!    through [`BlockUtility`]; the sequencer applies them
//! 4. **Failures stay local**: a failing primitive ends only its own thread
//!
//! The thread list is append-only while a tick runs. Finished threads are
//! reaped at the end of the tick, so indices stay valid for the whole pass.

pub mod clock;
pub mod clones;
pub mod collaborators;
pub mod dispatch;
pub mod entity;
pub mod frame;
pub mod lifecycle;
pub mod sequencer;
pub mod thread;
pub mod util;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, MonotonicClock, StackTimer};
pub use collaborators::{Evaluator, NoEvaluator, NullRenderer, Renderer};
pub use dispatch::{CohortId, HatEvent, Message};
pub use entity::{Entity, EntityId};
pub use frame::{ConstructPhase, StackFrame};
pub use lifecycle::{LifecycleBus, LifecycleEvent};
pub use sequencer::TickSummary;
pub use thread::{Thread, ThreadId, ThreadStatus};
pub use util::BlockUtility;

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::blocks::PrimitiveTable;
use crate::config::SchedulerConfig;
use crate::errors::{BlockError, ErrorRecord};
use crate::project::{Project, ScriptId};
use crate::value::Value;

use dispatch::Cohort;

/* ===================== Runtime ===================== */

pub struct Runtime {
    pub(crate) config: SchedulerConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) evaluator: Box<dyn Evaluator>,
    pub(crate) primitives: PrimitiveTable,

    /// Back-most first; the stage is always at index 0 once a project is loaded
    pub(crate) targets: Vec<Entity>,
    pub(crate) threads: Vec<Thread>,

    /// Broadcast messages by lowercased name
    pub(crate) messages: HashMap<String, Message>,
    pub(crate) cohorts: HashMap<CohortId, Cohort>,

    pub(crate) counter: f64,
    pub(crate) last_error: Option<ErrorRecord>,
    pub(crate) lifecycle: LifecycleBus,
    pub(crate) tick: u64,
    pub(crate) redraw_requested: bool,
    /// Flips every tick; "every other frame" hats fire when it was set
    pub(crate) other_frame: bool,

    next_thread_id: u64,
    next_cohort_id: u64,
}

impl Runtime {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            renderer: Box::new(NullRenderer),
            evaluator: Box::new(NoEvaluator),
            primitives: PrimitiveTable::standard(),
            targets: Vec::new(),
            threads: Vec::new(),
            messages: HashMap::new(),
            cohorts: HashMap::new(),
            counter: 0.0,
            last_error: None,
            lifecycle: LifecycleBus::default(),
            tick: 0,
            redraw_requested: false,
            other_frame: false,
            next_thread_id: 1,
            next_cohort_id: 1,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_primitives(mut self, primitives: PrimitiveTable) -> Self {
        self.primitives = primitives;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn primitives(&self) -> &PrimitiveTable {
        &self.primitives
    }

    /// Replace all entities with the project's originals. Running threads are
    /// stopped first.
    pub fn load_project(&mut self, project: &Project) {
        for thread in &mut self.threads {
            thread.stop_this_script();
        }
        self.targets.clear();

        let stage = project.targets.iter().filter(|t| t.is_stage);
        let sprites = project.targets.iter().filter(|t| !t.is_stage);
        for def in stage.chain(sprites) {
            self.targets.push(Entity::from_def(def));
        }

        info!(targets = self.targets.len(), "Project loaded");
    }

    /* ===================== Entity Registry ===================== */

    pub fn entities(&self) -> &[Entity] {
        &self.targets
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.targets.iter_mut().find(|t| t.id == id)
    }

    pub fn stage(&self) -> Option<&Entity> {
        self.targets.iter().find(|t| t.is_stage)
    }

    /// The original sprite with this name (never the stage, never a clone)
    pub fn find_entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.targets
            .iter()
            .find(|t| t.is_original && !t.is_stage && t.name == name)
    }

    /// Register an entity in front of every other one
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.targets.push(entity);
        id
    }

    /// Remove an entity and tell subscribers. Its threads are left to the
    /// caller (see [`Runtime::stop_for_target`]).
    pub fn dispose_entity(&mut self, id: EntityId) -> bool {
        let Some(pos) = self.targets.iter().position(|t| t.id == id) else {
            return false;
        };

        let entity = self.targets.remove(pos);
        debug!(target_name = %entity.name, id = %id, "Entity disposed");
        self.emit(LifecycleEvent::TargetDisposed(id));
        true
    }

    /* ===================== Threads ===================== */

    /// All threads, including finished ones not yet reaped
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn active_thread_count(&self) -> usize {
        self.threads.iter().filter(|t| !t.is_done()).count()
    }

    pub(crate) fn thread_index(&self, id: ThreadId) -> Option<usize> {
        self.threads.iter().position(|t| t.id == id)
    }

    pub(crate) fn next_thread_id(&mut self) -> ThreadId {
        let id = ThreadId(self.next_thread_id);
        self.next_thread_id += 1;
        id
    }

    pub(crate) fn next_cohort_id(&mut self) -> CohortId {
        let id = CohortId(self.next_cohort_id);
        self.next_cohort_id += 1;
        id
    }

    /* ===================== Variables ===================== */

    /// Read a variable: the entity's own first, then the stage's
    pub fn variable(&self, entity: EntityId, name: &str) -> Option<&Value> {
        self.entity(entity)
            .and_then(|e| e.variables.get(name))
            .or_else(|| self.stage().and_then(|s| s.variables.get(name)))
    }

    /// Write a variable where it is found (entity, then stage), creating it
    /// on the entity when it exists nowhere
    pub fn set_variable(&mut self, entity: EntityId, name: &str, value: Value) {
        let local = self
            .entity(entity)
            .map(|e| e.variables.contains_key(name))
            .unwrap_or(false);
        let global = self
            .stage()
            .map(|s| s.variables.contains_key(name))
            .unwrap_or(false);

        let owner = if local || !global {
            self.entity_mut(entity)
        } else {
            self.targets.iter_mut().find(|t| t.is_stage)
        };

        if let Some(owner) = owner {
            owner.variables.insert(name.to_string(), value);
        }
    }

    /* ===================== Shared State ===================== */

    pub fn counter(&self) -> f64 {
        self.counter
    }

    pub fn set_counter(&mut self, value: f64) {
        self.counter = value;
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.last_error.as_ref()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Whether anything asked for a redraw during the last tick
    pub fn redraw_requested(&self) -> bool {
        self.redraw_requested
    }

    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
        self.renderer.request_redraw();
    }

    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    pub(crate) fn record_error(&mut self, idx: usize, opcode: &str, error: &BlockError) {
        let thread = &mut self.threads[idx];
        thread.stop_this_script();
        let thread_id = thread.id;
        let target_id = thread.target;

        let target = self
            .entity(target_id)
            .map(|e| e.name.clone())
            .unwrap_or_default();

        warn!(thread = %thread_id, entity = %target, opcode, error = %error, "Block failed, stopping thread");

        self.last_error = Some(ErrorRecord {
            thread: thread_id,
            target,
            opcode: opcode.to_string(),
            message: error.to_string(),
            at: Utc::now(),
        });
    }

    /* ===================== Lifecycle ===================== */

    pub fn on_lifecycle(&mut self, listener: impl FnMut(&LifecycleEvent) + 'static) {
        self.lifecycle.subscribe(listener);
    }

    pub(crate) fn emit(&mut self, event: LifecycleEvent) {
        self.lifecycle.emit(&event);
    }

    /* ===================== Stopping ===================== */

    /// Stop every thread and dispose every clone
    pub fn stop_all(&mut self) {
        info!("Stopping all threads");
        self.emit(LifecycleEvent::StopAll);

        let clones: Vec<EntityId> = self
            .targets
            .iter()
            .rev()
            .filter(|t| !t.is_original)
            .map(|t| t.id)
            .collect();
        for id in clones {
            self.dispose_entity(id);
        }

        for thread in &mut self.threads {
            thread.stop_this_script();
        }
    }

    /// Stop every thread running on `target`, optionally sparing one
    pub fn stop_for_target(&mut self, target: EntityId, except: Option<ThreadId>) {
        for thread in &mut self.threads {
            if thread.target == target && Some(thread.id) != except {
                thread.stop_this_script();
            }
        }
    }

    /// Green flag: stop everything, then start every flag script
    pub fn green_flag(&mut self) -> Vec<ThreadId> {
        self.stop_all();
        self.emit(LifecycleEvent::ProjectStart);
        let started = self.start_hats(HatEvent::Flag, None);
        info!(threads = started.len(), "Green flag");
        started
    }

    /// Restart the project without interrupting the calling script: every
    /// thread whose top block differs from `keep` stops, clones are disposed
    /// and flag scripts start again.
    pub fn reset_to_green_flag(&mut self, keep: &ScriptId) -> Vec<ThreadId> {
        self.emit(LifecycleEvent::ProjectStartBeforeReset);

        for thread in &mut self.threads {
            if &thread.top_block != keep {
                thread.stop_this_script();
            }
        }

        self.emit(LifecycleEvent::ProjectStart);

        let clones: Vec<EntityId> = self
            .targets
            .iter()
            .rev()
            .filter(|t| !t.is_original)
            .map(|t| t.id)
            .collect();
        for id in clones {
            self.dispose_entity(id);
            self.stop_for_target(id, None);
        }

        self.start_hats(HatEvent::Flag, None)
    }

    /// Tear everything down. The counter and all broadcast state are reset.
    pub fn dispose(&mut self) {
        info!("Disposing runtime");
        for thread in &mut self.threads {
            thread.stop_this_script();
        }
        self.threads.clear();
        self.targets.clear();
        self.messages.clear();
        self.cohorts.clear();
        self.counter = 0.0;
        self.last_error = None;
        self.redraw_requested = false;
        self.other_frame = false;
        self.emit(LifecycleEvent::RuntimeDisposed);
    }
}
