/// Task file written by `taskdeck init`: the usual chores of a Poetry-managed
/// FastAPI service.
pub const DEFAULT_TASKFILE: &str = r#"[project]
name = "fastapi-app"
description = "FastAPI service scaffolding"

[profile]
variable = "ENV"
default = "dev"
env_file = ".env.${PROFILE}"
allowed = ["dev", "prod"]

[tasks.install]
description = "Install dependencies"
message = "Installing dependencies..."
command = ["poetry", "install"]

[tasks.run]
description = "Run the development server"
message = "Starting server..."
command = ["poetry", "run", "uvicorn", "app.main:app", "--host", "0.0.0.0", "--port", "8000"]

[tasks.run.profiles.dev]
extra_args = ["--reload"]

[tasks.run.profiles.prod]
extra_args = ["--workers", "4"]

[tasks.test]
description = "Run the test suite"
message = "Running tests..."
command = ["poetry", "run", "pytest"]

[tasks.lint]
description = "Lint the code base"
message = "Running linter..."
command = ["poetry", "run", "ruff", "check", "."]

[tasks.typecheck]
description = "Type-check the application"
message = "Running type checker..."
command = ["poetry", "run", "mypy", "app"]

[tasks.docker-build]
description = "Build the container image"
message = "Building Docker image..."
command = ["docker", "build", "-t", "${PROJECT}", "."]

[tasks.docker-run]
description = "Run the container image"
message = "Running Docker container..."
command = ["docker", "run", "--rm", "-p", "8000:8000", "--env-file", ".env.${PROFILE}", "${PROJECT}"]

[tasks.export-requirements]
description = "Export requirements.txt for legacy tooling"
message = "Exporting requirements.txt..."
command = ["poetry", "export", "-f", "requirements.txt", "--output", "requirements.txt", "--without-hashes"]
outputs = ["requirements.txt"]

[tasks.audit]
description = "Audit dependencies for known vulnerabilities"
message = "Auditing dependencies..."
command = ["poetry", "run", "pip-audit"]

[tasks.release]
description = "Release checks"
message = "Running release checks..."
steps = ["test", "lint", "typecheck"]

[tasks.ci]
description = "CI checks"
message = "Running CI checks..."
steps = ["install", "lint", "typecheck", "test", "audit"]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::taskfile::{TaskFile, TaskKind};
    use crate::utils::validation::Validate;

    #[test]
    fn test_default_taskfile_is_valid() {
        let taskfile = TaskFile::from_toml_str(DEFAULT_TASKFILE).unwrap();
        taskfile.validate().unwrap();

        for name in [
            "install",
            "run",
            "test",
            "lint",
            "typecheck",
            "docker-build",
            "docker-run",
            "export-requirements",
            "audit",
            "release",
            "ci",
        ] {
            assert!(taskfile.get(name).is_some(), "missing task {name}");
        }
        assert_eq!(taskfile.tasks.len(), 11);
    }

    #[test]
    fn test_release_runs_test_lint_typecheck() {
        let taskfile = TaskFile::from_toml_str(DEFAULT_TASKFILE).unwrap();
        let release = taskfile.get("release").unwrap();

        assert_eq!(release.kind(), TaskKind::Composite);
        assert_eq!(
            release.steps.as_deref().unwrap(),
            ["test", "lint", "typecheck"]
        );
    }

    #[test]
    fn test_leaf_tasks_have_one_command() {
        let taskfile = TaskFile::from_toml_str(DEFAULT_TASKFILE).unwrap();
        for (name, task) in &taskfile.tasks {
            if task.kind() == TaskKind::Command {
                assert!(task.message.is_some(), "{name} has no status message");
                assert!(!task.command.as_ref().unwrap().is_empty());
            }
        }
    }
}
