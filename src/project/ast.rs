//! Block tree node types
//!
//! A project arrives as serde JSON. Branches are shared (`Arc`) so that
//! clones and running threads reference the same block tree without copying.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::value::Value;

/// A sequence of blocks: a script body or one branch of a C-block
pub type Branch = Arc<[Block]>;

pub fn empty_branch() -> Branch {
    Arc::from(Vec::new())
}

/// Identity of a script's top block
///
/// Threads started from the same script share a `ScriptId`, which is what
/// stop-scoping and "back to green flag" compare.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptId(pub String);

impl ScriptId {
    pub fn generate() -> Self {
        ScriptId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScriptId {
    fn from(s: &str) -> Self {
        ScriptId(s.to_string())
    }
}

/// The event a script listens for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Hat {
    /// when green flag clicked
    Flag,
    /// when I receive `name`
    Broadcast { name: String },
    /// when I start as a clone
    CloneStart,
    /// every other frame
    EveryOtherFrame,
}

/// A top-level script: a hat plus the blocks under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "ScriptId::generate")]
    pub id: ScriptId,
    pub hat: Hat,
    #[serde(default = "empty_branch")]
    pub body: Branch,
}

impl Script {
    pub fn new(id: impl Into<String>, hat: Hat, body: Vec<Block>) -> Self {
        Script {
            id: ScriptId(id.into()),
            hat,
            body: Arc::from(body),
        }
    }
}

/// An argument slot on a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    /// `{ "var": "name" }` reads a variable
    Variable { var: String },
    /// `{ "block": {...} }` evaluates a reporter block
    Reporter { block: Box<Block> },
    /// any JSON scalar
    Literal(Value),
}

/// One block: an opcode with inputs, fields and nested branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub opcode: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Input>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<Branch>,
}

impl Block {
    pub fn new(opcode: impl Into<String>) -> Self {
        Block {
            id: None,
            opcode: opcode.into(),
            inputs: BTreeMap::new(),
            fields: BTreeMap::new(),
            branches: Vec::new(),
        }
    }

    /// Set a literal input
    pub fn input(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs
            .insert(name.to_string(), Input::Literal(value.into()));
        self
    }

    /// Set an input that reads a variable
    pub fn var_input(mut self, name: &str, var: &str) -> Self {
        self.inputs.insert(
            name.to_string(),
            Input::Variable {
                var: var.to_string(),
            },
        );
        self
    }

    /// Set an input computed by a reporter block
    pub fn reporter(mut self, name: &str, block: Block) -> Self {
        self.inputs.insert(
            name.to_string(),
            Input::Reporter {
                block: Box::new(block),
            },
        );
        self
    }

    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Append the next branch (branch numbers start at 1)
    pub fn branch(mut self, blocks: Vec<Block>) -> Self {
        self.branches.push(Arc::from(blocks));
        self
    }

    /// Branch `n` (1-based), if present
    pub fn get_branch(&self, n: usize) -> Option<&Branch> {
        n.checked_sub(1).and_then(|i| self.branches.get(i))
    }

    /// Visit this block and everything nested in it
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Block)) {
        visit(self);
        for input in self.inputs.values() {
            if let Input::Reporter { block } = input {
                block.walk(visit);
            }
        }
        for branch in &self.branches {
            for block in branch.iter() {
                block.walk(visit);
            }
        }
    }

    /// Human-readable label for logs: the block id if it has one, else the opcode
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.opcode)
    }
}
