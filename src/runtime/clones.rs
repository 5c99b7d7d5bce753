//! Clone lifecycle

use tracing::debug;

use super::dispatch::HatEvent;
use super::entity::EntityId;
use super::Runtime;

/// Selector value naming the calling entity
pub const MYSELF: &str = "_myself_";
/// Selector value naming the stage
pub const STAGE: &str = "_stage_";

impl Runtime {
    /// Resolve a sprite selector against the calling entity
    pub fn resolve_sprite(&self, selector: &str, caller: EntityId) -> Option<EntityId> {
        match selector {
            MYSELF => self.entity(caller).map(|e| e.id),
            STAGE => self.stage().map(|s| s.id),
            name => self.find_entity_by_name(name).map(|e| e.id),
        }
    }

    pub fn clone_count(&self) -> usize {
        self.targets.iter().filter(|t| !t.is_original).count()
    }

    /// Clone `source` and start its "when I start as a clone" scripts.
    ///
    /// The clone is placed directly behind its source. Returns `None` for the
    /// stage or once the clone limit is reached.
    pub fn create_clone(&mut self, source: EntityId) -> Option<EntityId> {
        let pos = self.targets.iter().position(|t| t.id == source)?;
        if self.targets[pos].is_stage {
            return None;
        }

        if self.clone_count() >= self.config.max_clones {
            debug!(limit = self.config.max_clones, "Clone limit reached");
            return None;
        }

        let clone = self.targets[pos].make_clone();
        let id = clone.id;
        self.targets.insert(pos, clone);

        let started = self.start_hats(HatEvent::CloneStart, Some(id));
        debug!(clone = %id, source = %source, threads = started.len(), "Clone created");
        Some(id)
    }

    /// Dispose a clone and stop its threads. Originals are left alone.
    pub fn delete_clone(&mut self, id: EntityId) -> bool {
        match self.entity(id) {
            Some(e) if !e.is_original => {}
            _ => return false,
        }

        self.dispose_entity(id);
        self.stop_for_target(id, None);
        true
    }

    /// Delete every clone of `source`'s family. The set is taken up front so
    /// clones created while this runs survive.
    pub fn delete_clones_of(&mut self, source: EntityId) -> usize {
        let Some(origin) = self.entity(source).filter(|e| !e.is_stage).map(|e| e.origin) else {
            return 0;
        };

        let doomed: Vec<EntityId> = self
            .targets
            .iter()
            .filter(|t| t.is_clone_of(origin))
            .map(|t| t.id)
            .collect();

        doomed.into_iter().filter(|id| self.delete_clone(*id)).count()
    }
}
