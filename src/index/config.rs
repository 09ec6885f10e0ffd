//! Index Configuration

use crate::vector::DEFAULT_UNIT_EPSILON;

/// Flat index configuration
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Vector dimension (None = fixed by the first insert)
    pub dimension: Option<usize>,

    /// Number of scan worker threads (0 = auto-detect)
    pub scan_workers: usize,

    /// Minimum entry count before a query scan is split across workers
    pub parallel_threshold: usize,

    /// Vectors scored per kernel call
    pub score_block: usize,

    /// Vectors to reserve room for up front
    pub initial_capacity: usize,

    /// Magnitudes this close to 1 are stored without dividing
    pub unit_epsilon: f32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: None,
            scan_workers: 0,          // Auto-detect (typically num_cores)
            parallel_threshold: 4096, // Below this, thread startup dominates
            score_block: 1024,
            initial_capacity: 0,
            unit_epsilon: DEFAULT_UNIT_EPSILON,
        }
    }
}

impl IndexConfig {
    /// Set a fixed dimension
    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = Some(dim);
        self
    }

    /// Set scan worker count (0 = auto-detect)
    pub fn with_scan_workers(mut self, workers: usize) -> Self {
        self.scan_workers = workers;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_score_block(mut self, block: usize) -> Self {
        self.score_block = block;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_unit_epsilon(mut self, epsilon: f32) -> Self {
        self.unit_epsilon = epsilon;
        self
    }

    /// Worker count after resolving auto-detect
    pub fn resolved_workers(&self) -> usize {
        if self.scan_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.scan_workers
        }
    }
}
