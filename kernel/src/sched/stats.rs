use core::sync::atomic::{AtomicU64, Ordering};

/// Lightweight per-CPU scheduler counters
#[derive(Debug)]
pub struct SchedulerStats {
    /// Scheduler passes started
    pub passes: AtomicU64,
    /// Passes that found nothing runnable
    pub idle_passes: AtomicU64,
    /// Context handoffs into a process
    pub handoffs: AtomicU64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            idle_passes: AtomicU64::new(0),
            handoffs: AtomicU64::new(0),
        }
    }

    pub fn record_pass(&self, handoffs: usize) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        if handoffs == 0 {
            self.idle_passes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.handoffs.fetch_add(handoffs as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            idle_passes: self.idle_passes.load(Ordering::Relaxed),
            handoffs: self.handoffs.load(Ordering::Relaxed),
        }
    }
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub passes: u64,
    pub idle_passes: u64,
    pub handoffs: u64,
}
