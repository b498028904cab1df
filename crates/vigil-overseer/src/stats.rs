//! Running counters for the dispatch loop.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    events_received: AtomicU64,
    events_accepted: AtomicU64,
    batches_dispatched: AtomicU64,
    changes_dispatched: AtomicU64,
    agent_failures: AtomicU64,
    reports_surfaced: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_event(&self, accepted: bool) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        if accepted {
            self.events_accepted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_batch(&self, changes: usize) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.changes_dispatched.fetch_add(changes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_agent_failure(&self) {
        self.agent_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reports(&self, count: usize) {
        self.reports_surfaced.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> OverseerStats {
        OverseerStats {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            changes_dispatched: self.changes_dispatched.load(Ordering::Relaxed),
            agent_failures: self.agent_failures.load(Ordering::Relaxed),
            reports_surfaced: self.reports_surfaced.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the overseer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverseerStats {
    /// Raw watcher events seen by the loop
    pub events_received: u64,
    /// Events the gate kept
    pub events_accepted: u64,
    pub batches_dispatched: u64,
    /// Total changes across all dispatched batches
    pub changes_dispatched: u64,
    /// Failed `process_batch` calls, counted per agent per batch
    pub agent_failures: u64,
    pub reports_surfaced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let counters = StatsCounters::default();
        counters.record_event(true);
        counters.record_event(false);
        counters.record_batch(3);
        counters.record_agent_failure();
        counters.record_reports(2);

        let stats = counters.snapshot();
        assert_eq!(stats.events_received, 2);
        assert_eq!(stats.events_accepted, 1);
        assert_eq!(stats.batches_dispatched, 1);
        assert_eq!(stats.changes_dispatched, 3);
        assert_eq!(stats.agent_failures, 1);
        assert_eq!(stats.reports_surfaced, 2);
    }
}
