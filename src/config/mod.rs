#[cfg(feature = "cli")]
pub mod cli;
pub mod defaults;
pub mod profile;
pub mod taskfile;

#[cfg(feature = "cli")]
pub use cli::{Cli, Command, RunArgs};
pub use profile::{Profile, ProfileSettings, ProfileSource};
pub use taskfile::{TaskDefinition, TaskFile, TaskKind, DEFAULT_TASKFILE_NAME};
