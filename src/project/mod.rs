//! Project definitions
//!
//! A project is a list of targets (one stage plus sprites), each with its
//! variables and scripts. Block parsing from the visual editor happens
//! elsewhere; this crate only consumes the resulting JSON.

pub mod ast;

pub use ast::{empty_branch, Block, Branch, Hat, Input, Script, ScriptId};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::blocks::PrimitiveTable;
use crate::errors::ProjectError;
use crate::value::Value;

/// A whole project as loaded from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub targets: Vec<TargetDef>,
}

/// One original target (the stage or a sprite)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDef {
    pub name: String,
    #[serde(default)]
    pub is_stage: bool,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub scripts: Vec<Script>,
}

impl TargetDef {
    pub fn stage(scripts: Vec<Script>) -> Self {
        TargetDef {
            name: "Stage".to_string(),
            is_stage: true,
            variables: BTreeMap::new(),
            scripts,
        }
    }

    pub fn sprite(name: impl Into<String>, scripts: Vec<Script>) -> Self {
        TargetDef {
            name: name.into(),
            is_stage: false,
            variables: BTreeMap::new(),
            scripts,
        }
    }

    pub fn with_variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

impl Project {
    /// Parse a project from JSON and check its target list
    pub fn from_json(source: &str) -> Result<Self, ProjectError> {
        let project: Project = serde_json::from_str(source)?;
        project.check_targets()?;
        Ok(project)
    }

    /// Exactly one stage, and sprite names are unique
    pub fn check_targets(&self) -> Result<(), ProjectError> {
        let stages = self.targets.iter().filter(|t| t.is_stage).count();
        match stages {
            0 => return Err(ProjectError::MissingStage),
            1 => {}
            _ => return Err(ProjectError::DuplicateStage),
        }

        let mut seen = HashSet::new();
        for target in self.targets.iter().filter(|t| !t.is_stage) {
            if !seen.insert(target.name.as_str()) {
                return Err(ProjectError::DuplicateTarget(target.name.clone()));
            }
        }

        Ok(())
    }

    /// Every opcode used anywhere in the project
    pub fn opcodes(&self) -> BTreeSet<&str> {
        let mut opcodes = BTreeSet::new();
        for target in &self.targets {
            for script in &target.scripts {
                for block in script.body.iter() {
                    block.walk(&mut |b| {
                        opcodes.insert(b.opcode.as_str());
                    });
                }
            }
        }
        opcodes
    }

    /// Fail if any block uses an opcode the table doesn't implement
    pub fn validate(&self, primitives: &PrimitiveTable) -> Result<(), ProjectError> {
        let unknown: Vec<String> = self
            .opcodes()
            .into_iter()
            .filter(|op| !primitives.contains(op))
            .map(str::to_string)
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ProjectError::UnknownOpcodes(unknown))
        }
    }
}

/// Read and parse a project file
pub fn load_project(path: impl AsRef<Path>) -> Result<Project, ProjectError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Project::from_json(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"{
        "targets": [
            { "name": "Stage", "is_stage": true, "variables": { "score": 0 } },
            { "name": "Cat", "scripts": [
                { "id": "main", "hat": { "event": "flag" }, "body": [
                    { "opcode": "control_forever", "branches": [[
                        { "opcode": "control_wait", "inputs": { "DURATION": 1 } }
                    ]] }
                ] }
            ] }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let project = Project::from_json(PROJECT).unwrap();
        assert_eq!(project.targets.len(), 2);
        assert!(project.targets[0].is_stage);
        assert_eq!(project.targets[0].variables["score"], Value::Num(0.0));
        assert_eq!(project.targets[1].scripts[0].id, ScriptId::from("main"));
        assert_eq!(project.targets[1].scripts[0].hat, Hat::Flag);
    }

    #[test]
    fn test_opcodes_walks_branches() {
        let project = Project::from_json(PROJECT).unwrap();
        let opcodes: Vec<&str> = project.opcodes().into_iter().collect();
        assert_eq!(opcodes, vec!["control_forever", "control_wait"]);
    }

    #[test]
    fn test_validate_reports_unknown_opcodes() {
        let project = Project {
            targets: vec![TargetDef::stage(vec![Script::new(
                "s",
                Hat::Flag,
                vec![Block::new("looks_say"), Block::new("control_wait")],
            )])],
        };

        match project.validate(&PrimitiveTable::standard()) {
            Err(ProjectError::UnknownOpcodes(ops)) => assert_eq!(ops, vec!["looks_say"]),
            other => panic!("Expected UnknownOpcodes, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_stage() {
        let err = Project::from_json(r#"{ "targets": [ { "name": "Cat" } ] }"#).unwrap_err();
        assert!(matches!(err, ProjectError::MissingStage));
    }

    #[test]
    fn test_duplicate_sprite_names() {
        let json = r#"{ "targets": [
            { "name": "Stage", "is_stage": true },
            { "name": "Cat" },
            { "name": "Cat" }
        ] }"#;
        let err = Project::from_json(json).unwrap_err();
        assert!(matches!(err, ProjectError::DuplicateTarget(name) if name == "Cat"));
    }

    #[test]
    fn test_generated_script_ids() {
        let json = r#"{ "targets": [
            { "name": "Stage", "is_stage": true, "scripts": [
                { "hat": { "event": "flag" } },
                { "hat": { "event": "flag" } }
            ] }
        ] }"#;
        let project = Project::from_json(json).unwrap();
        let scripts = &project.targets[0].scripts;
        assert_ne!(scripts[0].id, scripts[1].id);
        assert!(scripts[0].body.is_empty());
    }
}
