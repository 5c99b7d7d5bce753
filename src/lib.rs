pub mod blocks;
pub mod cli;
pub mod config;
pub mod errors;
pub mod project;
pub mod runtime;
pub mod value;

// Re-export main types
pub use blocks::{Args, Primitive, PrimitiveTable};
pub use config::{Config, SchedulerConfig};
pub use errors::{BlockError, ConfigError, ErrorRecord, EvalError, ProjectError};
pub use project::{load_project, Block, Hat, Project, Script, TargetDef};
pub use runtime::{Runtime, ThreadId, ThreadStatus};
pub use value::Value;
