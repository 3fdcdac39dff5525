use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Taskfile parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingConfigError { field: String },

    #[error("Unknown task: {name}")]
    UnknownTask { name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Failed to launch '{program}' for task '{task}': {source}")]
    SpawnError {
        task: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Task '{task}' failed with exit code {code}")]
    TaskFailed { task: String, code: i32 },

    #[error("Task '{task}' was terminated by a signal")]
    TaskTerminated { task: String },

    #[error("Task '{task}' timed out after {seconds}s")]
    TaskTimedOut { task: String, seconds: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Planning,
    Execution,
    System,
}

pub type Result<T> = std::result::Result<T, TaskError>;

impl TaskError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TaskError::ParseError(_)
            | TaskError::ConfigError { .. }
            | TaskError::InvalidConfigValueError { .. }
            | TaskError::MissingConfigError { .. } => ErrorCategory::Configuration,
            TaskError::UnknownTask { .. } | TaskError::CircularDependency { .. } => {
                ErrorCategory::Planning
            }
            TaskError::SpawnError { .. }
            | TaskError::TaskFailed { .. }
            | TaskError::TaskTerminated { .. }
            | TaskError::TaskTimedOut { .. } => ErrorCategory::Execution,
            TaskError::IoError(_) | TaskError::SerializationError(_) => ErrorCategory::System,
        }
    }

    /// Process exit code for the CLI. A failed child hands back its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::TaskFailed { code, .. } => *code,
            TaskError::TaskTimedOut { .. } => 124,
            TaskError::SpawnError { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                127
            }
            TaskError::SpawnError { .. } | TaskError::TaskTerminated { .. } => 1,
            _ => match self.category() {
                ErrorCategory::Configuration | ErrorCategory::Planning => 2,
                _ => 3,
            },
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            TaskError::ParseError(_) => {
                "Check the TOML syntax of the task file".to_string()
            }
            TaskError::ConfigError { .. }
            | TaskError::InvalidConfigValueError { .. }
            | TaskError::MissingConfigError { .. } => {
                "Fix the task file and run `taskdeck check` again".to_string()
            }
            TaskError::UnknownTask { .. } => {
                "Run `taskdeck list` to see the available tasks".to_string()
            }
            TaskError::CircularDependency { .. } => {
                "Remove one of the steps that closes the cycle".to_string()
            }
            TaskError::SpawnError { program, .. } => {
                format!("Make sure '{}' is installed and on PATH", program)
            }
            TaskError::TaskFailed { task, .. } | TaskError::TaskTerminated { task } => {
                format!("See the output of '{}' above", task)
            }
            TaskError::TaskTimedOut { task, .. } => {
                format!("Raise timeout_seconds for '{}' or investigate why it hangs", task)
            }
            TaskError::IoError(_) | TaskError::SerializationError(_) => {
                "Check file permissions and free disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Task file problem: {}", self),
            ErrorCategory::Planning => format!("Cannot plan the run: {}", self),
            ErrorCategory::Execution => self.to_string(),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}
