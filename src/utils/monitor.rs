use std::time::Duration;

#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// How often a running child gets sampled.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessStats {
    pub peak_memory_mb: u64,
    pub peak_cpu_usage: f32,
    pub samples: usize,
}

/// Samples CPU and memory of one child process while it runs.
#[cfg(feature = "cli")]
pub struct ProcessMonitor {
    system: System,
    pid: Pid,
    stats: ProcessStats,
}

#[cfg(feature = "cli")]
impl ProcessMonitor {
    pub fn new(pid: u32) -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
            stats: ProcessStats::default(),
        }
    }

    /// Returns false once the process is gone.
    pub fn sample(&mut self) -> bool {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        let Some(process) = self.system.process(self.pid) else {
            return false;
        };

        let memory_mb = process.memory() / 1024 / 1024;
        self.stats.peak_memory_mb = self.stats.peak_memory_mb.max(memory_mb);
        self.stats.peak_cpu_usage = self.stats.peak_cpu_usage.max(process.cpu_usage());
        self.stats.samples += 1;

        tracing::trace!(
            "📊 pid {} - CPU: {:.1}%, Memory: {}MB",
            self.pid,
            process.cpu_usage(),
            memory_mb
        );
        true
    }

    pub fn finish(self) -> ProcessStats {
        tracing::debug!(
            "📊 pid {} finished - Peak memory: {}MB, Peak CPU: {:.1}% ({} samples)",
            self.pid,
            self.stats.peak_memory_mb,
            self.stats.peak_cpu_usage,
            self.stats.samples
        );
        self.stats
    }
}

// 非 CLI 建置沒有 sysinfo，監控退化為空實現
#[cfg(not(feature = "cli"))]
pub struct ProcessMonitor;

#[cfg(not(feature = "cli"))]
impl ProcessMonitor {
    pub fn new(_pid: u32) -> Self {
        Self
    }

    pub fn sample(&mut self) -> bool {
        false
    }

    pub fn finish(self) -> ProcessStats {
        ProcessStats::default()
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_samples_current_process() {
        let mut monitor = ProcessMonitor::new(std::process::id());
        assert!(monitor.sample());
        let stats = monitor.finish();
        assert_eq!(stats.samples, 1);
    }

    #[test]
    fn test_monitor_reports_missing_process() {
        // no process runs under this pid
        let mut monitor = ProcessMonitor::new(u32::MAX - 1);
        assert!(!monitor.sample());
        assert_eq!(monitor.finish(), ProcessStats::default());
    }
}
