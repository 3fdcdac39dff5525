use crate::config::profile::Profile;
use crate::config::taskfile::{substitute_vars, TaskDefinition, TaskFile};
use crate::domain::model::Invocation;
use crate::utils::error::{Result, TaskError};
use crate::utils::validation::validate_relative_path;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub invocation: Invocation,
    pub message: String,
    /// Composites this step was expanded from, outermost first.
    pub parents: Vec<String>,
    /// Own outputs followed by those of every enclosing composite.
    pub discard_on_failure: Vec<PathBuf>,
}

impl PlannedStep {
    pub fn task(&self) -> &str {
        &self.invocation.task
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub profile: String,
    pub requested: Vec<String>,
    pub steps: Vec<PlannedStep>,
    pub warnings: Vec<String>,
}

impl ExecutionPlan {
    /// Flattens the requested tasks into leaf commands, depth first.
    /// A task shared by several composites runs once, where it first appears.
    pub fn build(
        taskfile: &TaskFile,
        profile: &Profile,
        base_dir: &Path,
        requested: &[String],
    ) -> Result<Self> {
        let mut planner = Planner {
            taskfile,
            profile,
            base_dir,
            planned: HashSet::new(),
            stack: Vec::new(),
            steps: Vec::new(),
            warnings: Vec::new(),
        };

        for name in requested {
            planner.expand(name, &[])?;
        }

        Ok(Self {
            profile: profile.name.clone(),
            requested: requested.to_vec(),
            steps: planner.steps,
            warnings: planner.warnings,
        })
    }

    /// Dry-run listing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Plan for {} (profile '{}', {} step{}):",
            self.requested.join(", "),
            self.profile,
            self.steps.len(),
            if self.steps.len() == 1 { "" } else { "s" }
        );

        for (index, step) in self.steps.iter().enumerate() {
            let via = if step.parents.is_empty() {
                String::new()
            } else {
                format!(" [{}]", step.parents.join(" > "))
            };
            let _ = writeln!(out, "  {}. {}{}", index + 1, step.task(), via);
            let _ = writeln!(out, "       $ {}", step.invocation.command_line());
            if step.invocation.working_dir != Path::new(".") {
                let _ = writeln!(out, "       in {}", step.invocation.working_dir.display());
            }
        }

        for warning in &self.warnings {
            let _ = writeln!(out, "  ⚠️ {}", warning);
        }
        out
    }
}

struct Planner<'a> {
    taskfile: &'a TaskFile,
    profile: &'a Profile,
    base_dir: &'a Path,
    planned: HashSet<String>,
    stack: Vec<String>,
    steps: Vec<PlannedStep>,
    warnings: Vec<String>,
}

impl Planner<'_> {
    fn expand(&mut self, name: &str, inherited_outputs: &[PathBuf]) -> Result<()> {
        let task = self
            .taskfile
            .get(name)
            .ok_or_else(|| TaskError::UnknownTask {
                name: name.to_string(),
            })?;

        if self.stack.iter().any(|entry| entry == name) {
            let mut cycle = self.stack.clone();
            cycle.push(name.to_string());
            return Err(TaskError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }

        if !self.planned.insert(name.to_string()) {
            tracing::debug!("Task '{}' already planned, not repeating it", name);
            return Ok(());
        }

        let mut discard = self.resolve_outputs(name, task)?;
        discard.extend_from_slice(inherited_outputs);

        match &task.steps {
            Some(steps) => {
                self.stack.push(name.to_string());
                for step in steps {
                    self.expand(step, &discard)?;
                }
                self.stack.pop();
            }
            None => {
                let invocation = self.invocation(name, task)?;
                self.warnings
                    .extend(check_launcher_flags(self.profile, &invocation));
                self.steps.push(PlannedStep {
                    invocation,
                    message: task.status_message(name),
                    parents: self.stack.clone(),
                    discard_on_failure: discard,
                });
            }
        }

        Ok(())
    }

    fn expand_vars(&self, task_name: &str, text: &str) -> String {
        substitute_vars(text, |var| match var {
            "PROFILE" => Some(self.profile.name.clone()),
            "PROJECT" => Some(self.taskfile.project.name.clone()),
            "TASK" => Some(task_name.to_string()),
            other => self
                .profile
                .vars
                .get(other)
                .cloned()
                .or_else(|| std::env::var(other).ok()),
        })
    }

    /// Outputs get deleted on failure, so the expanded form must still stay inside `base_dir`.
    fn resolve_outputs(&self, name: &str, task: &TaskDefinition) -> Result<Vec<PathBuf>> {
        task.outputs
            .iter()
            .map(|output| {
                let expanded = self.expand_vars(name, output);
                validate_relative_path(&format!("tasks.{}.outputs", name), &expanded)?;
                Ok(self.base_dir.join(expanded))
            })
            .collect()
    }

    fn invocation(&self, name: &str, task: &TaskDefinition) -> Result<Invocation> {
        let command = task
            .command
            .as_deref()
            .ok_or_else(|| TaskError::MissingConfigError {
                field: format!("tasks.{}.command", name),
            })?;
        let (program, fixed_args) = command
            .split_first()
            .ok_or_else(|| TaskError::MissingConfigError {
                field: format!("tasks.{}.command", name),
            })?;

        let overlay = task.profiles.get(&self.profile.name);

        let mut args: Vec<String> = fixed_args
            .iter()
            .map(|arg| self.expand_vars(name, arg))
            .collect();
        if let Some(overlay) = overlay {
            args.extend(overlay.extra_args.iter().map(|arg| self.expand_vars(name, arg)));
        }

        // profile env file < task env < per-profile task env
        let mut env: BTreeMap<String, String> = self.profile.child_env();
        for (key, value) in &task.env {
            env.insert(key.clone(), self.expand_vars(name, value));
        }
        if let Some(overlay) = overlay {
            for (key, value) in &overlay.env {
                env.insert(key.clone(), self.expand_vars(name, value));
            }
        }

        let working_dir = match &task.working_dir {
            Some(dir) => self.base_dir.join(self.expand_vars(name, dir)),
            None => self.base_dir.to_path_buf(),
        };

        Ok(Invocation {
            task: name.to_string(),
            program: self.expand_vars(name, program),
            args,
            env,
            working_dir,
            timeout: task.timeout_seconds.map(Duration::from_secs),
        })
    }
}

/// Flags `--reload` under a production profile and `--workers N` (N > 1) outside one.
pub fn check_launcher_flags(profile: &Profile, invocation: &Invocation) -> Vec<String> {
    let mut warnings = Vec::new();
    let args = &invocation.args;

    let reload = args.iter().any(|arg| arg == "--reload");
    if reload && profile.is_production() {
        warnings.push(format!(
            "Task '{}' enables --reload under the production profile '{}'",
            invocation.task, profile.name
        ));
    }

    let workers = args.iter().enumerate().find_map(|(index, arg)| {
        match arg.strip_prefix("--workers") {
            Some("") => args.get(index + 1).and_then(|v| v.parse::<u32>().ok()),
            Some(rest) => rest.strip_prefix('=').and_then(|v| v.parse::<u32>().ok()),
            None => None,
        }
    });
    if let Some(count) = workers {
        if count > 1 && !profile.is_production() {
            warnings.push(format!(
                "Task '{}' starts {} workers under the non-production profile '{}'",
                invocation.task, count, profile.name
            ));
        }
    }

    for warning in &warnings {
        tracing::warn!("⚠️ {}", warning);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::DEFAULT_TASKFILE;
    use crate::config::profile::ProfileSource;

    fn profile(name: &str) -> Profile {
        let mut vars = BTreeMap::new();
        vars.insert("PORT".to_string(), "9000".to_string());
        Profile {
            name: name.to_string(),
            source: ProfileSource::CommandLine,
            variable: "ENV".to_string(),
            env_file: None,
            vars,
        }
    }

    fn plan_for(content: &str, profile_name: &str, requested: &[&str]) -> Result<ExecutionPlan> {
        let taskfile = TaskFile::from_toml_str(content).unwrap();
        let requested: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
        ExecutionPlan::build(&taskfile, &profile(profile_name), Path::new("/work"), &requested)
    }

    fn tasks_of(plan: &ExecutionPlan) -> Vec<&str> {
        plan.steps.iter().map(|s| s.task()).collect()
    }

    #[test]
    fn test_release_expands_in_order() {
        let plan = plan_for(DEFAULT_TASKFILE, "dev", &["release"]).unwrap();
        assert_eq!(tasks_of(&plan), vec!["test", "lint", "typecheck"]);
        assert!(plan.steps.iter().all(|s| s.parents == vec!["release"]));
        assert_eq!(plan.steps[1].message, "Running linter...");
        assert_eq!(plan.steps[1].invocation.program, "poetry");
        assert_eq!(plan.steps[1].invocation.args, vec!["run", "ruff", "check", "."]);
    }

    #[test]
    fn test_shared_tasks_run_once() {
        let plan = plan_for(DEFAULT_TASKFILE, "dev", &["release", "ci"]).unwrap();
        assert_eq!(
            tasks_of(&plan),
            vec!["test", "lint", "typecheck", "install", "audit"]
        );
    }

    #[test]
    fn test_unknown_task() {
        let err = plan_for(DEFAULT_TASKFILE, "dev", &["deploy"]).unwrap_err();
        assert!(matches!(err, TaskError::UnknownTask { name } if name == "deploy"));
    }

    #[test]
    fn test_cycle_is_caught_while_planning() {
        let content = r#"
[project]
name = "x"

[tasks.a]
steps = ["b"]

[tasks.b]
steps = ["a"]
"#;
        let err = plan_for(content, "dev", &["a"]).unwrap_err();
        match err {
            TaskError::CircularDependency { cycle } => assert_eq!(cycle, "a -> b -> a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_profile_extra_args_and_launcher_warnings() {
        let dev = plan_for(DEFAULT_TASKFILE, "dev", &["run"]).unwrap();
        assert_eq!(dev.steps[0].invocation.args.last().unwrap(), "--reload");
        assert!(dev.warnings.is_empty());

        let prod = plan_for(DEFAULT_TASKFILE, "prod", &["run"]).unwrap();
        assert!(prod.steps[0].invocation.args.ends_with(&["--workers".to_string(), "4".to_string()]));
        assert!(prod.warnings.is_empty());

        let content = r#"
[project]
name = "x"

[tasks.serve]
command = ["uvicorn", "app.main:app", "--reload", "--workers=3"]
"#;
        let plan_prod = plan_for(content, "prod", &["serve"]).unwrap();
        assert_eq!(plan_prod.warnings.len(), 1);
        assert!(plan_prod.warnings[0].contains("--reload"));

        let plan_dev = plan_for(content, "dev", &["serve"]).unwrap();
        assert_eq!(plan_dev.warnings.len(), 1);
        assert!(plan_dev.warnings[0].contains("3 workers"));
    }

    #[test]
    fn test_placeholders_and_env_layers() {
        let content = r#"
[project]
name = "shop"

[tasks.up]
command = ["docker", "run", "-p", "${PORT}:80", "${PROJECT}:${PROFILE}"]
working_dir = "deploy"
env = { LOG_LEVEL = "info", TARGET = "${TASK}" }

[tasks.up.profiles.prod]
env = { LOG_LEVEL = "warning" }
"#;
        let plan = plan_for(content, "prod", &["up"]).unwrap();
        let inv = &plan.steps[0].invocation;

        assert_eq!(inv.args, vec!["run", "-p", "9000:80", "shop:prod"]);
        assert_eq!(inv.working_dir, PathBuf::from("/work/deploy"));
        assert_eq!(inv.env["ENV"], "prod");
        assert_eq!(inv.env["PORT"], "9000");
        assert_eq!(inv.env["LOG_LEVEL"], "warning");
        assert_eq!(inv.env["TARGET"], "up");
    }

    #[test]
    fn test_outputs_inherit_from_composites() {
        let content = r#"
[project]
name = "x"

[tasks.wheel]
command = ["poetry", "build"]
outputs = ["dist/app.whl"]

[tasks.docs]
command = ["mkdocs", "build"]

[tasks.package]
steps = ["wheel", "docs"]
outputs = ["dist"]
"#;
        let plan = plan_for(content, "dev", &["package"]).unwrap();
        assert_eq!(
            plan.steps[0].discard_on_failure,
            vec![PathBuf::from("/work/dist/app.whl"), PathBuf::from("/work/dist")]
        );
        assert_eq!(plan.steps[1].discard_on_failure, vec![PathBuf::from("/work/dist")]);
    }

    #[test]
    fn test_expanded_outputs_must_stay_inside_project() {
        let content = r#"
[project]
name = "x"

[tasks.export]
command = ["sh", "-c", "exit 1"]
outputs = ["${OUT}"]
"#;
        let taskfile = TaskFile::from_toml_str(content).unwrap();
        let requested = vec!["export".to_string()];

        for target in ["/tmp/victim", "../victim", "build/../../victim"] {
            let mut escaping = profile("dev");
            escaping.vars.insert("OUT".to_string(), target.to_string());

            let err = ExecutionPlan::build(&taskfile, &escaping, Path::new("/work"), &requested)
                .unwrap_err();
            assert!(
                matches!(err, TaskError::InvalidConfigValueError { ref value, .. } if value == target),
                "{target} was accepted: {err}"
            );
        }

        let mut inside = profile("dev");
        inside.vars.insert("OUT".to_string(), "dist/app.whl".to_string());
        let plan = ExecutionPlan::build(&taskfile, &inside, Path::new("/work"), &requested).unwrap();
        assert_eq!(
            plan.steps[0].discard_on_failure,
            vec![PathBuf::from("/work/dist/app.whl")]
        );
    }

    #[test]
    fn test_timeout_is_carried() {
        let content = r#"
[project]
name = "x"

[tasks.slow]
command = ["sleep", "1"]
timeout_seconds = 30
"#;
        let plan = plan_for(content, "dev", &["slow"]).unwrap();
        assert_eq!(plan.steps[0].invocation.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_render_lists_steps() {
        let plan = plan_for(DEFAULT_TASKFILE, "dev", &["release"]).unwrap();
        let text = plan.render();
        assert!(text.contains("profile 'dev', 3 steps"));
        assert!(text.contains("2. lint [release]"));
        assert!(text.contains("$ poetry run mypy app"));
    }
}
