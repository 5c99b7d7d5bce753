//! Block primitives
//!
//! Every opcode maps to a plain function. A primitive reads its evaluated
//! arguments, asks the scheduler for yields, branches and stops through
//! [`BlockUtility`], and may return a value (reporters) or nothing (commands).
//! It keeps no state of its own; anything that must survive a yield lives on
//! the stack frame or the runtime.

pub mod control;
pub mod data;
pub mod events;
pub mod operators;

use std::collections::{BTreeMap, HashMap};

use crate::errors::BlockError;
use crate::runtime::BlockUtility;
use crate::value::{self, Value};

/* ===================== Primitive Types ===================== */

pub type Primitive = fn(&Args, &mut BlockUtility<'_>) -> Result<Option<Value>, BlockError>;

/// Evaluated fields and inputs of one block visit
///
/// Missing arguments read as the empty string, so primitives coerce rather
/// than fail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(BTreeMap<String, Value>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Value {
        self.0.get(name).cloned().unwrap_or_default()
    }

    pub fn number(&self, name: &str) -> f64 {
        self.0.get(name).map(value::to_number).unwrap_or(0.0)
    }

    pub fn boolean(&self, name: &str) -> bool {
        self.0.get(name).map(value::to_boolean).unwrap_or(false)
    }

    pub fn string(&self, name: &str) -> String {
        self.0.get(name).map(value::to_string).unwrap_or_default()
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Args {
    fn from(pairs: [(&str, Value); N]) -> Self {
        Args(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

/* ===================== Primitive Table ===================== */

/// Opcode to primitive lookup
#[derive(Clone, Default)]
pub struct PrimitiveTable {
    primitives: HashMap<&'static str, Primitive>,
}

impl PrimitiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control, event, data and operator blocks
    pub fn standard() -> Self {
        let mut table = Self::new();
        for (opcode, primitive) in control::primitives()
            .into_iter()
            .chain(events::primitives())
            .chain(data::primitives())
            .chain(operators::primitives())
        {
            table.register(opcode, primitive);
        }
        table
    }

    /// Add or replace a primitive
    pub fn register(&mut self, opcode: &'static str, primitive: Primitive) {
        self.primitives.insert(opcode, primitive);
    }

    pub fn get(&self, opcode: &str) -> Option<Primitive> {
        self.primitives.get(opcode).copied()
    }

    pub fn contains(&self, opcode: &str) -> bool {
        self.primitives.contains_key(opcode)
    }

    pub fn opcodes(&self) -> Vec<&'static str> {
        let mut opcodes: Vec<_> = self.primitives.keys().copied().collect();
        opcodes.sort_unstable();
        opcodes
    }
}

impl std::fmt::Debug for PrimitiveTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimitiveTable")
            .field("opcodes", &self.primitives.len())
            .finish()
    }
}
