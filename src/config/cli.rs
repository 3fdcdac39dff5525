use crate::config::taskfile::DEFAULT_TASKFILE_NAME;
use crate::utils::error::{Result, TaskError};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{validate_identifier, validate_path, Validate};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "taskdeck", version)]
#[command(about = "Run the named project tasks declared in a Taskfile")]
pub struct Cli {
    /// Task file to load
    #[arg(short = 'f', long = "file", default_value = DEFAULT_TASKFILE_NAME)]
    pub file: PathBuf,

    /// Profile to use instead of the profile variable (ENV by default)
    #[arg(short = 'e', long = "env")]
    pub profile: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one or more tasks in order, stopping at the first failure
    Run(RunArgs),
    /// List the tasks of the task file
    List,
    /// Load and validate the task file
    Check,
    /// Write a starter task file
    Init {
        /// Overwrite an existing task file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(required = true)]
    pub tasks: Vec<String>,

    /// Print the plan without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Sample CPU and memory of each command while it runs
    #[arg(long)]
    pub monitor: bool,

    /// Write a JSON execution summary to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,

    #[arg(long)]
    pub execution_id: Option<String>,
}

impl Cli {
    /// Directory the task file lives in; relative paths resolve against it.
    pub fn base_dir(&self) -> PathBuf {
        match self.file.parent() {
            Some(parent) if parent != Path::new("") => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl Validate for Cli {
    fn validate(&self) -> Result<()> {
        validate_path("--file", &self.file.to_string_lossy())?;

        if let Some(profile) = &self.profile {
            validate_identifier("--env", profile)?;
        }

        if let Command::Run(args) = &self.command {
            for task in &args.tasks {
                validate_identifier("task", task)?;
            }
            if let Some(id) = &args.execution_id {
                if id.trim().is_empty() {
                    return Err(TaskError::InvalidConfigValueError {
                        field: "--execution-id".to_string(),
                        value: id.clone(),
                        reason: "Execution id cannot be blank".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
