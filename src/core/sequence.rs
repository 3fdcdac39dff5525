use crate::core::cleanup::discard_outputs;
use crate::core::plan::{ExecutionPlan, PlannedStep};
use crate::core::report::RunReport;
use crate::domain::model::{StepReport, StepStatus};
use crate::domain::ports::CommandRunner;
use crate::utils::error::TaskError;
use std::time::Instant;

/// 依序執行計畫中的每個步驟，遇到第一個失敗即停止
pub struct TaskSequence<R: CommandRunner> {
    runner: R,
    execution_id: String,
    quiet: bool,
}

impl<R: CommandRunner> TaskSequence<R> {
    pub fn new(runner: R, execution_id: String) -> Self {
        Self {
            runner,
            execution_id,
            quiet: false,
        }
    }

    /// Suppress the `==>` status lines on stdout.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub async fn execute(&self, plan: &ExecutionPlan) -> RunReport {
        let mut report = RunReport::new(self.execution_id.clone(), plan.profile.clone());
        let started = Instant::now();
        let total = plan.steps.len();

        tracing::info!(
            "🚀 Execution {} started: {} step(s) for {}",
            self.execution_id,
            total,
            plan.requested.join(", ")
        );

        for (index, step) in plan.steps.iter().enumerate() {
            if report.error.is_some() {
                tracing::debug!("⏭️ Skipping {} after earlier failure", step.task());
                report.steps.push(skipped(step));
                continue;
            }

            if !self.quiet {
                println!("==> {}", step.message);
            }
            tracing::info!(
                "▶️ [{}/{}] {}: {}",
                index + 1,
                total,
                step.task(),
                step.invocation.command_line()
            );

            let (step_report, error) = self.run_step(step).await;
            report.steps.push(step_report);

            if let Some(error) = error {
                tracing::error!("❌ {}", error);
                report.error = Some(error);
            }
        }

        report.total_duration_ms = started.elapsed().as_millis() as u64;
        if report.succeeded() {
            tracing::info!(
                "✅ Execution {} completed in {}ms",
                self.execution_id,
                report.total_duration_ms
            );
        }
        report
    }

    async fn run_step(&self, step: &PlannedStep) -> (StepReport, Option<TaskError>) {
        let step_start = Instant::now();
        let mut step_report = StepReport {
            task: step.task().to_string(),
            command: step.invocation.command_line(),
            status: StepStatus::Succeeded,
            exit_code: None,
            duration_ms: 0,
            peak_memory_mb: None,
            discarded: Vec::new(),
        };

        let error = match self.runner.run(&step.invocation).await {
            Ok(outcome) => {
                step_report.exit_code = outcome.exit_code;
                step_report.peak_memory_mb = outcome.peak_memory_mb;
                match outcome.exit_code {
                    Some(0) => None,
                    Some(code) => Some(TaskError::TaskFailed {
                        task: step.task().to_string(),
                        code,
                    }),
                    None => Some(TaskError::TaskTerminated {
                        task: step.task().to_string(),
                    }),
                }
            }
            Err(e) => Some(e),
        };

        step_report.duration_ms = step_start.elapsed().as_millis() as u64;

        if error.is_some() {
            step_report.status = StepStatus::Failed;
            step_report.discarded = discard_outputs(&step.discard_on_failure).await;
        } else {
            tracing::info!(
                "✅ {} finished in {}ms",
                step.task(),
                step_report.duration_ms
            );
        }

        (step_report, error)
    }
}

fn skipped(step: &PlannedStep) -> StepReport {
    StepReport {
        task: step.task().to_string(),
        command: step.invocation.command_line(),
        status: StepStatus::Skipped,
        exit_code: None,
        duration_ms: 0,
        peak_memory_mb: None,
        discarded: Vec::new(),
    }
}
