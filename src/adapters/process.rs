use crate::domain::model::{CommandOutcome, Invocation};
use crate::domain::ports::CommandRunner;
use crate::utils::error::{Result, TaskError};
use crate::utils::monitor::{ProcessMonitor, SAMPLE_INTERVAL};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::{Child, Command};

/// Runs invocations as child processes sharing the terminal.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    monitor: bool,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled;
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        let started = Instant::now();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| TaskError::SpawnError {
            task: invocation.task.clone(),
            program: invocation.program.clone(),
            source,
        })?;
        tracing::debug!("Spawned '{}' as pid {:?}", invocation.program, child.id());

        let mut monitor = if self.monitor {
            child.id().map(ProcessMonitor::new)
        } else {
            None
        };

        let status = match invocation.timeout {
            Some(limit) => {
                let waited =
                    tokio::time::timeout(limit, wait_child(&mut child, monitor.as_mut())).await;
                match waited {
                    Ok(status) => status?,
                    Err(_) => {
                        tracing::warn!(
                            "⏱️ {} exceeded {}s, killing it",
                            invocation.task,
                            limit.as_secs_f64()
                        );
                        if let Err(e) = child.kill().await {
                            tracing::warn!("⚠️ Could not kill {}: {}", invocation.task, e);
                        }
                        return Err(TaskError::TaskTimedOut {
                            task: invocation.task.clone(),
                            seconds: limit.as_secs_f64(),
                        });
                    }
                }
            }
            None => wait_child(&mut child, monitor.as_mut()).await?,
        };

        let peak_memory_mb = monitor.map(|m| m.finish().peak_memory_mb);

        Ok(CommandOutcome {
            exit_code: status.code(),
            duration: started.elapsed(),
            peak_memory_mb,
        })
    }
}

async fn wait_child(
    child: &mut Child,
    monitor: Option<&mut ProcessMonitor>,
) -> std::io::Result<ExitStatus> {
    let Some(monitor) = monitor else {
        return child.wait().await;
    };

    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    loop {
        tokio::select! {
            status = child.wait() => return status,
            _ = ticker.tick() => {
                if !monitor.sample() {
                    return child.wait().await;
                }
            }
        }
    }
}
