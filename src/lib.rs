pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;

pub use adapters::ProcessRunner;
pub use config::{Profile, TaskFile};
pub use core::{ExecutionPlan, RunReport, TaskSequence};
pub use utils::error::{Result, TaskError};
