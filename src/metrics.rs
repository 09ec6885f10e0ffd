//! Basic Metrics
//!
//! Per-operation counters and latency tracking for index calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Index operations tracked by [`IndexMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Remove,
    Query,
}

impl Operation {
    const ALL: [Operation; 3] = [Operation::Insert, Operation::Remove, Operation::Query];

    fn slot(self) -> usize {
        match self {
            Operation::Insert => 0,
            Operation::Remove => 1,
            Operation::Query => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Remove => "remove",
            Operation::Query => "query",
        }
    }
}

/// Metrics collector
#[derive(Debug)]
pub struct IndexMetrics {
    /// Operations per kind, indexed by `Operation::slot`
    ops: [AtomicU64; 3],

    /// Calls that returned an error
    errors: AtomicU64,

    /// Latency tracking (simplified)
    latency_sum_us: AtomicU64,
    latency_count: AtomicU64,
    latency_min_us: AtomicU64,
    latency_max_us: AtomicU64,
}

impl Default for IndexMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            ops: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            errors: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            latency_min_us: AtomicU64::new(u64::MAX),
            latency_max_us: AtomicU64::new(0),
        }
    }

    /// Record an operation
    pub fn record(&self, op: Operation, latency: Duration, ok: bool) {
        self.ops[op.slot()].fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }

        let latency_us = latency.as_micros() as u64;
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_min_us.fetch_min(latency_us, Ordering::Relaxed);
        self.latency_max_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    /// Get total operations count
    pub fn total_ops(&self) -> u64 {
        self.ops.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Get count for one operation kind
    pub fn ops(&self, op: Operation) -> u64 {
        self.ops[op.slot()].load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Get average latency in microseconds
    pub fn avg_latency_us(&self) -> f64 {
        let count = self.latency_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        sum as f64 / count as f64
    }

    /// Get min latency in microseconds
    pub fn min_latency_us(&self) -> u64 {
        let min = self.latency_min_us.load(Ordering::Relaxed);
        if min == u64::MAX {
            0
        } else {
            min
        }
    }

    /// Get max latency in microseconds
    pub fn max_latency_us(&self) -> u64 {
        self.latency_max_us.load(Ordering::Relaxed)
    }

    /// Get a summary of metrics
    pub fn summary(&self) -> String {
        let per_op: Vec<String> = Operation::ALL
            .iter()
            .map(|op| format!("{}={}", op.name(), self.ops(*op)))
            .collect();
        format!(
            "Operations: {} ({}) errors={} | Latency (µs): avg={:.1}, min={}, max={}",
            self.total_ops(),
            per_op.join(", "),
            self.errors(),
            self.avg_latency_us(),
            self.min_latency_us(),
            self.max_latency_us()
        )
    }
}
