//! Error types
//!
//! Library errors are typed with `thiserror`; the CLI wraps them in
//! `anyhow` with context.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::runtime::ThreadId;

/// A failure raised by a block primitive
///
/// These never escape the scheduler: the offending thread is stopped and the
/// error lands in the runtime's last-error slot.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BlockError {
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),

    #[error("{opcode}: {message}")]
    Failed { opcode: String, message: String },
}

impl BlockError {
    pub fn failed(opcode: impl Into<String>, message: impl Into<String>) -> Self {
        BlockError::Failed {
            opcode: opcode.into(),
            message: message.into(),
        }
    }
}

/// Errors loading or validating a project
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read project {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project has no stage target")]
    MissingStage,

    #[error("project has more than one stage target")]
    DuplicateStage,

    #[error("two sprites are named `{0}`")]
    DuplicateTarget(String),

    #[error("unknown opcodes: {}", .0.join(", "))]
    UnknownOpcodes(Vec<String>),
}

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Failure reported by the external code evaluator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("no evaluator is available")]
    Unavailable,

    #[error("evaluation rejected: {0}")]
    Rejected(String),
}

/// Last-error slot contents: which thread failed, where and why
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub thread: ThreadId,
    pub target: String,
    pub opcode: String,
    pub message: String,
    pub at: DateTime<Utc>,
}
