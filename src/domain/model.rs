use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// One external command with a fixed argument list, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub task: String,
    pub program: String,
    pub args: Vec<String>,
    /// Overlay on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub working_dir: PathBuf,
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Shell-like rendering for logs and dry runs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_arg)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// What a runner observed once the child exited.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub peak_memory_mb: Option<u64>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub task: String,
    pub command: String,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub peak_memory_mb: Option<u64>,
    /// Outputs removed after this step failed.
    pub discarded: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str]) -> Invocation {
        Invocation {
            task: "t".to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
            working_dir: PathBuf::from("."),
            timeout: None,
        }
    }

    #[test]
    fn test_command_line_quotes_only_when_needed() {
        let inv = invocation("poetry", &["run", "ruff", "check", "."]);
        assert_eq!(inv.command_line(), "poetry run ruff check .");

        let inv = invocation("sh", &["-c", "echo it's done"]);
        assert_eq!(inv.command_line(), r"sh -c 'echo it'\''s done'");

        let inv = invocation("echo", &[""]);
        assert_eq!(inv.command_line(), "echo ''");
    }

    #[test]
    fn test_outcome_success() {
        let outcome = CommandOutcome {
            exit_code: Some(0),
            duration: Duration::from_millis(3),
            peak_memory_mb: None,
        };
        assert!(outcome.success());

        let signalled = CommandOutcome {
            exit_code: None,
            ..outcome
        };
        assert!(!signalled.success());
    }
}
