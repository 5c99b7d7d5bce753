//! Hat dispatch and broadcasts
//!
//! Dispatch resolves an event to the scripts listening for it and starts (or
//! restarts) one thread per match. Broadcast-and-wait groups the threads it
//! started into a cohort so the caller can wait for all of them and collect a
//! return value.

use serde::Serialize;
use tracing::debug;

use super::entity::EntityId;
use super::thread::{Thread, ThreadId};
use super::Runtime;
use crate::project::{Hat, Script};
use crate::value::Value;

/// An event that can start scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatEvent<'a> {
    Flag,
    Broadcast(&'a str),
    CloneStart,
    EveryOtherFrame,
}

impl HatEvent<'_> {
    pub fn matches(&self, hat: &Hat) -> bool {
        match (self, hat) {
            (HatEvent::Flag, Hat::Flag) => true,
            (HatEvent::CloneStart, Hat::CloneStart) => true,
            (HatEvent::EveryOtherFrame, Hat::EveryOtherFrame) => true,
            (HatEvent::Broadcast(sent), Hat::Broadcast { name }) => sent.eq_ignore_ascii_case(name),
            _ => false,
        }
    }

    /// Whether a script already running for this event starts over.
    /// "When I start as a clone" never restarts.
    pub fn restarts_existing(&self) -> bool {
        !matches!(self, HatEvent::CloneStart)
    }
}

/// Broadcast message state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub name: String,
    pub is_sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CohortId(pub u64);

/// Threads started by one broadcast-and-wait
#[derive(Debug)]
pub(crate) struct Cohort {
    pub owner: ThreadId,
    /// Member thread ids with the generation they had when started
    pub members: Vec<(ThreadId, u64)>,
    pub return_value: Option<Value>,
}

impl Runtime {
    /// Start every script matching `event`, optionally only on one entity.
    ///
    /// Entities are searched front-most first. Returns the threads started or
    /// restarted, in that order.
    pub fn start_hats(&mut self, event: HatEvent<'_>, scope: Option<EntityId>) -> Vec<ThreadId> {
        let matches: Vec<(EntityId, Script)> = self
            .targets
            .iter()
            .rev()
            .filter(|t| scope.map_or(true, |id| t.id == id))
            .flat_map(|t| {
                t.scripts
                    .iter()
                    .filter(|s| event.matches(&s.hat))
                    .map(move |s| (t.id, s.clone()))
            })
            .collect();

        let mut started = Vec::with_capacity(matches.len());
        for (target, script) in matches {
            let existing = self
                .threads
                .iter_mut()
                .find(|t| t.target == target && t.top_block == script.id && !t.is_done());

            match existing {
                Some(thread) if event.restarts_existing() => {
                    thread.restart(self.tick);
                    debug!(thread = %thread.id, script = %script.id, "Thread restarted");
                    started.push(thread.id);
                }
                Some(_) => {}
                None => started.push(self.spawn_thread(target, &script)),
            }
        }

        started
    }

    pub(crate) fn spawn_thread(&mut self, target: EntityId, script: &Script) -> ThreadId {
        let id = self.next_thread_id();
        self.threads.push(Thread::new(id, target, script, self.tick));
        debug!(thread = %id, script = %script.id, "Thread spawned");
        id
    }

    /// Fire a broadcast: mark it sent (even with no listeners), start its
    /// scripts and hand `payload` to each started thread.
    pub fn broadcast(
        &mut self,
        name: &str,
        payload: Option<Value>,
        scope: Option<EntityId>,
    ) -> Vec<ThreadId> {
        self.mark_sent(name);
        let started = self.start_hats(HatEvent::Broadcast(name), scope);

        if let Some(payload) = payload {
            for thread in self.threads.iter_mut().filter(|t| started.contains(&t.id)) {
                thread.received_data = Some(payload.clone());
            }
        }

        started
    }

    /// Record that `name` was broadcast, listeners or not
    pub fn mark_sent(&mut self, name: &str) {
        self.messages
            .entry(name.to_lowercase())
            .or_insert_with(|| Message {
                name: name.to_string(),
                is_sent: false,
            })
            .is_sent = true;
    }

    pub fn is_broadcast_received(&self, name: &str) -> bool {
        self.messages
            .get(&name.to_lowercase())
            .map_or(false, |m| m.is_sent)
    }

    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages.get(&name.to_lowercase())
    }

    /* ===================== Cohorts ===================== */

    pub(crate) fn open_cohort(&mut self, owner: ThreadId, members: &[ThreadId]) -> CohortId {
        let id = self.next_cohort_id();
        let mut tracked = Vec::with_capacity(members.len());

        for thread in self.threads.iter_mut().filter(|t| members.contains(&t.id)) {
            thread.cohort = Some(id);
            tracked.push((thread.id, thread.generation));
        }

        self.cohorts.insert(
            id,
            Cohort {
                owner,
                members: tracked,
                return_value: None,
            },
        );
        id
    }

    /// Every member has finished, been reaped or been restarted for
    /// something else
    pub(crate) fn cohort_finished(&self, id: CohortId) -> bool {
        let Some(cohort) = self.cohorts.get(&id) else {
            return true;
        };

        cohort.members.iter().all(|(member, generation)| {
            self.thread(*member)
                .map_or(true, |t| t.is_done() || t.generation != *generation)
        })
    }

    /// Last writer wins. Writers in the same tick land in stepping order.
    pub(crate) fn set_cohort_return(&mut self, id: CohortId, value: Value) {
        if let Some(cohort) = self.cohorts.get_mut(&id) {
            cohort.return_value = Some(value);
        }
    }

    pub(crate) fn close_cohort(&mut self, id: CohortId) -> Option<Value> {
        self.cohorts.remove(&id).and_then(|c| c.return_value)
    }
}
