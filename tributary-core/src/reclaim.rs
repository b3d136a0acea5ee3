use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Periodic memory checkpoint in the collector loop.
///
/// Download buffers and decode scratch space are freed when each fetch task
/// finishes. Every `interval` completions this samples the resident size of
/// the process, so memory growth over a large dataset shows up in the logs
/// while it happens.
pub struct ReclaimCheckpoint {
    interval: usize,
    completed: usize,
    passes: usize,
    system: System,
    pid: Option<Pid>,
}

impl ReclaimCheckpoint {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            completed: 0,
            passes: 0,
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Records one completed fetch, `held` being the number of tables
    /// collected so far. Samples memory when the interval is reached and
    /// returns whether it did.
    pub fn record_completion(&mut self, held: usize) -> bool {
        self.completed += 1;
        if self.completed % self.interval != 0 {
            return false;
        }
        self.sample(held);
        true
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    fn sample(&mut self, held: usize) {
        self.passes += 1;

        match self.resident_bytes() {
            Some(bytes) => tracing::debug!(
                "Memory checkpoint {} after {} completions: {} tables held, {} MiB resident",
                self.passes,
                self.completed,
                held,
                bytes / (1024 * 1024)
            ),
            None => tracing::debug!(
                "Memory checkpoint {} after {} completions: {} tables held",
                self.passes,
                self.completed,
                held
            ),
        }
    }

    fn resident_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|process| process.memory())
    }
}
