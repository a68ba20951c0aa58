//! Live crawl statistics
//!
//! The monitor is advisory: it feeds progress reporting and has no effect
//! on scheduling decisions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of dispatcher activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// Fetches currently holding a permit
    pub active: u64,
    /// Admitted tasks waiting to be dispatched
    pub queued: u64,
    /// Fetches that have finished (successfully or not)
    pub completed: u64,
}

/// Shared counters updated by the dispatcher and the coordinator
#[derive(Debug, Default)]
pub struct Monitor {
    active: AtomicU64,
    queued: AtomicU64,
    completed: AtomicU64,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn task_started(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reports the coordinator's current queue depth
    pub fn set_queue_depth(&self, depth: usize) {
        self.queued.store(depth as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            active: self.active.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
        }
    }

    /// Emits the current counters through tracing
    pub fn log_progress(&self) {
        let snap = self.snapshot();
        tracing::info!(
            "Crawl activity: {} active, {} queued, {} completed",
            snap.active,
            snap.queued,
            snap.completed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let monitor = Monitor::new();
        assert_eq!(
            monitor.snapshot(),
            MonitorSnapshot {
                active: 0,
                queued: 0,
                completed: 0
            }
        );

        monitor.set_queue_depth(4);
        monitor.task_started();
        monitor.task_started();
        assert_eq!(monitor.snapshot().active, 2);
        assert_eq!(monitor.snapshot().queued, 4);

        monitor.task_finished();
        let snap = monitor.snapshot();
        assert_eq!(snap.active, 1);
        assert_eq!(snap.completed, 1);
    }
}
