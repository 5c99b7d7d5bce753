//! Lifecycle signals
//!
//! Other subsystems (text bubbles, animation state, extension listeners)
//! subscribe here for their own per-entity cleanup. Every signal is delivered
//! synchronously, once, to every subscriber, in subscription order.

use super::entity::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Fired before "back to green flag" stops other scripts
    ProjectStartBeforeReset,
    ProjectStart,
    /// Fired at the top of every tick, before any thread steps
    StepStart,
    StopAll,
    TargetDisposed(EntityId),
    RuntimeDisposed,
}

pub type LifecycleListener = Box<dyn FnMut(&LifecycleEvent)>;

#[derive(Default)]
pub struct LifecycleBus {
    listeners: Vec<LifecycleListener>,
}

impl LifecycleBus {
    pub fn subscribe(&mut self, listener: impl FnMut(&LifecycleEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: &LifecycleEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
