use crate::domain::model::{StepReport, StepStatus};
use crate::utils::error::{Result, TaskError};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::path::Path;

/// Outcome of one `taskdeck run`.
#[derive(Debug)]
pub struct RunReport {
    pub execution_id: String,
    pub profile: String,
    pub started_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub steps: Vec<StepReport>,
    /// First failure; every later step is reported as skipped.
    pub error: Option<TaskError>,
}

impl RunReport {
    pub fn new(execution_id: String, profile: String) -> Self {
        Self {
            execution_id,
            profile,
            started_at: Utc::now(),
            total_duration_ms: 0,
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|step| step.status == StepStatus::Failed)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|step| step.status == status).count()
    }

    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(0, TaskError::exit_code)
    }

    pub fn summary(&self) -> serde_json::Value {
        json!({
            "execution_id": self.execution_id,
            "profile": self.profile,
            "started_at": self.started_at.to_rfc3339(),
            "total_duration_ms": self.total_duration_ms,
            "success": self.succeeded(),
            "succeeded": self.count(StepStatus::Succeeded),
            "failed": self.count(StepStatus::Failed),
            "skipped": self.count(StepStatus::Skipped),
            "error": self.error.as_ref().map(|e| e.to_string()),
            "steps": self.steps,
        })
    }

    pub async fn export<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(&self.summary())?;
        tokio::fs::write(path, body).await?;
        tracing::info!("📄 Execution summary written to {}", path.display());
        Ok(())
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "📊 {} succeeded, {} failed, {} skipped in {}ms (profile '{}')",
            self.count(StepStatus::Succeeded),
            self.count(StepStatus::Failed),
            self.count(StepStatus::Skipped),
            self.total_duration_ms,
            self.profile
        );
        for step in &self.steps {
            tracing::debug!(
                "  {} {:?} {}ms exit={:?}",
                step.task,
                step.status,
                step.duration_ms,
                step.exit_code
            );
        }
    }

    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}
