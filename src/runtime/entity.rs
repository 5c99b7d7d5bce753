//! Entities (targets): the stage, sprites and their clones

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::project::{Script, TargetDef};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn generate() -> Self {
        EntityId(Uuid::new_v4())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An executable context
///
/// Clones share their original's scripts and copy its variables at the
/// moment of cloning. `origin` is the original's id for every member of a
/// sprite's clone family (the original included).
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub origin: EntityId,
    pub is_stage: bool,
    pub is_original: bool,
    pub variables: BTreeMap<String, Value>,
    pub scripts: Arc<[Script]>,
}

impl Entity {
    pub fn from_def(def: &TargetDef) -> Self {
        let id = EntityId::generate();
        Self {
            id,
            name: def.name.clone(),
            origin: id,
            is_stage: def.is_stage,
            is_original: true,
            variables: def.variables.clone(),
            scripts: Arc::from(def.scripts.clone()),
        }
    }

    /// Duplicate this entity's state (not its threads)
    pub fn make_clone(&self) -> Entity {
        Entity {
            id: EntityId::generate(),
            name: self.name.clone(),
            origin: self.origin,
            is_stage: false,
            is_original: false,
            variables: self.variables.clone(),
            scripts: self.scripts.clone(),
        }
    }

    pub fn is_clone_of(&self, origin: EntityId) -> bool {
        !self.is_original && self.origin == origin
    }
}
