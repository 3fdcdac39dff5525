use crate::config::profile::ProfileSettings;
use crate::utils::error::{Result, TaskError};
use crate::utils::validation::{
    validate_identifier, validate_non_empty_string, validate_path, validate_positive_number,
    validate_relative_path, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_TASKFILE_NAME: &str = "Taskfile.toml";

static VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskFile {
    pub project: ProjectInfo,
    #[serde(default)]
    pub profile: ProfileSettings,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    pub description: Option<String>,
    /// Printed before the task runs.
    pub message: Option<String>,
    /// Program followed by its fixed arguments.
    pub command: Option<Vec<String>>,
    /// Other tasks, run in order.
    pub steps: Option<Vec<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    /// Removed when this task, or a composite containing it, fails.
    #[serde(default)]
    pub outputs: Vec<String>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileOverride>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverride {
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Command,
    Composite,
}

impl TaskDefinition {
    pub fn kind(&self) -> TaskKind {
        if self.steps.is_some() {
            TaskKind::Composite
        } else {
            TaskKind::Command
        }
    }

    pub fn status_message(&self, name: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("Running {}...", name))
    }

    fn validate_named(&self, name: &str, profile: &ProfileSettings) -> Result<()> {
        let field = |suffix: &str| format!("tasks.{}.{}", name, suffix);

        match (&self.command, &self.steps) {
            (Some(_), Some(_)) => {
                return Err(TaskError::ConfigError {
                    message: format!("Task '{}' declares both command and steps", name),
                })
            }
            (None, None) => {
                return Err(TaskError::ConfigError {
                    message: format!("Task '{}' needs either a command or steps", name),
                })
            }
            (Some(command), None) => match command.first() {
                Some(program) => validate_non_empty_string(&field("command[0]"), program)?,
                None => {
                    return Err(TaskError::MissingConfigError {
                        field: field("command"),
                    })
                }
            },
            (None, Some(steps)) => {
                if steps.is_empty() {
                    return Err(TaskError::MissingConfigError {
                        field: field("steps"),
                    });
                }
                if !self.profiles.is_empty() || self.timeout_seconds.is_some() {
                    return Err(TaskError::ConfigError {
                        message: format!(
                            "Composite task '{}' cannot set profiles or timeout_seconds",
                            name
                        ),
                    });
                }
            }
        }

        for output in &self.outputs {
            validate_relative_path(&field("outputs"), output)?;
        }

        if let Some(dir) = &self.working_dir {
            validate_path(&field("working_dir"), dir)?;
        }

        if let Some(seconds) = self.timeout_seconds {
            validate_positive_number(&field("timeout_seconds"), seconds, 1)?;
        }

        for key in self.env.keys() {
            validate_non_empty_string(&field("env"), key)?;
        }

        for profile_name in self.profiles.keys() {
            validate_identifier(&field("profiles"), profile_name)?;
            if !profile.is_allowed(profile_name) {
                return Err(TaskError::InvalidConfigValueError {
                    field: field("profiles"),
                    value: profile_name.clone(),
                    reason: "Profile is not listed in profile.allowed".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl TaskFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TaskError::ConfigError {
            message: format!("Cannot read task file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Placeholders stay untouched here; they are expanded per task at plan time.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// Returns the first cycle found as `a -> b -> a`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for name in self.tasks.keys() {
            if let Some(cycle) = self.visit(name, &mut visited, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = stack.iter().position(|entry| *entry == name) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(name.to_string());
            return Some(cycle);
        }

        if !visited.insert(name) {
            return None;
        }

        stack.push(name);
        if let Some(task) = self.tasks.get(name) {
            for step in task.steps.iter().flatten() {
                if let Some(cycle) = self.visit(step, visited, stack) {
                    return Some(cycle);
                }
            }
        }
        stack.pop();

        None
    }
}

impl Validate for TaskFile {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("project.name", &self.project.name)?;
        self.profile.validate()?;

        if self.tasks.is_empty() {
            return Err(TaskError::ConfigError {
                message: "Task file defines no tasks".to_string(),
            });
        }

        for (name, task) in &self.tasks {
            validate_identifier("tasks", name)?;
            task.validate_named(name, &self.profile)?;

            for step in task.steps.iter().flatten() {
                if step == name {
                    return Err(TaskError::CircularDependency {
                        cycle: format!("{} -> {}", name, name),
                    });
                }
                if !self.tasks.contains_key(step) {
                    return Err(TaskError::ConfigError {
                        message: format!("Task '{}' refers to unknown task '{}'", name, step),
                    });
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            return Err(TaskError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }

        Ok(())
    }
}

/// Expands `${NAME}` placeholders; names the lookup does not know are kept verbatim.
pub fn substitute_vars<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    VAR_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            let var_name = &caps[1];
            lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
        })
        .into_owned()
}
