//! System Metrics
//!
//! Lock-free counters updated from pull tasks and the scheduler tick. All
//! updates use relaxed ordering; [`SystemMetrics::stats`] is a best-effort
//! snapshot, not a consistent cut.

use crate::supervisor::Strategy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// System-wide counters
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_killed: AtomicU64,
    pub messages_processed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,

    // Supervision
    pub handler_failures: AtomicU64,
    pub messages_dropped: AtomicU64,
    pub messages_retried: AtomicU64,
    pub custom_strategies: AtomicU64,
    pub supervisor_failures: AtomicU64,

    // Scheduling
    pub ticks: AtomicU64,
    pub idle_ticks: AtomicU64,
    pub idle_stops: AtomicU64,
}

impl SystemMetrics {
    pub fn record_actor_spawned(&self) {
        self.actors_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_actor_killed(&self) {
        self.actors_killed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_processed(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    /// Record a handler failure and the strategy chosen for it
    pub fn record_strategy(&self, strategy: &Strategy) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
        let counter = match strategy {
            Strategy::Drop => &self.messages_dropped,
            Strategy::Retry => &self.messages_retried,
            Strategy::Custom(_) => &self.custom_strategies,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_supervisor_failure(&self) {
        self.supervisor_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_tick(&self) {
        self.idle_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_stop(&self) {
        self.idle_stops.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of every counter
    pub fn stats(&self) -> SystemStats {
        SystemStats {
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            actors_killed: self.actors_killed.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
            supervision: SupervisionStats {
                handler_failures: self.handler_failures.load(Ordering::Relaxed),
                messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
                messages_retried: self.messages_retried.load(Ordering::Relaxed),
                custom_strategies: self.custom_strategies.load(Ordering::Relaxed),
                supervisor_failures: self.supervisor_failures.load(Ordering::Relaxed),
            },
            scheduling: SchedulingStats {
                ticks: self.ticks.load(Ordering::Relaxed),
                idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
                idle_stops: self.idle_stops.load(Ordering::Relaxed),
            },
        }
    }
}

/// Point-in-time copy of [`SystemMetrics`]
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub actors_spawned: u64,
    pub actors_killed: u64,
    pub messages_processed: u64,
    pub avg_processing_time_ns: f64,
    pub supervision: SupervisionStats,
    pub scheduling: SchedulingStats,
}

/// Handler failure and recovery statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisionStats {
    pub handler_failures: u64,
    pub messages_dropped: u64,
    pub messages_retried: u64,
    pub custom_strategies: u64,
    pub supervisor_failures: u64,
}

/// Scheduler activity statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingStats {
    pub ticks: u64,
    pub idle_ticks: u64,
    pub idle_stops: u64,
}
