//! Flat Index
//!
//! Exact cosine top-k over every stored vector.

use std::sync::atomic::AtomicBool;
use tracing::{debug, trace};

use crate::error::{IndexError, Result};
use crate::vector::{Normalizer, UnitVector, VectorBuffer};

use super::config::IndexConfig;
use super::scan;

/// A query hit borrowing its payload from the index
#[derive(Debug)]
pub struct ScoredEntry<'a, P> {
    pub id: u64,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    pub payload: &'a P,
}

// Manual impls: a borrowed payload is Copy whatever P is
impl<P> Clone for ScoredEntry<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for ScoredEntry<'_, P> {}

/// Observable index state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Populated(usize),
}

/// Exact nearest-neighbor index over unit vectors
///
/// Vectors are normalized once on insert and stored contiguously, so a query
/// is one dot product per entry. Payloads sit in a vector parallel to the
/// buffer slots and are never inspected.
///
/// Mutation takes `&mut self` and queries take `&self`: a scan can never
/// observe a half-finished swap-remove. Use [`super::SharedIndex`] to share
/// one index between threads.
///
/// # Example
///
/// ```
/// use flatrix::FlatIndex;
///
/// let mut index = FlatIndex::new(3).unwrap();
/// index.insert(1, &[1.0, 0.0, 0.0], "east").unwrap();
/// index.insert(2, &[0.0, 1.0, 0.0], "north").unwrap();
///
/// let hits = index.query(&[0.9, 0.1, 0.0], 1).unwrap();
/// assert_eq!(hits[0].id, 1);
/// assert_eq!(*hits[0].payload, "east");
/// ```
#[derive(Debug, Clone)]
pub struct FlatIndex<P> {
    config: IndexConfig,
    /// None until the first insert when constructed without a dimension
    dim: Option<usize>,
    normalizer: Normalizer,
    workers: usize,
    buffer: VectorBuffer,
    /// Slot-aligned with `buffer`
    payloads: Vec<P>,
}

impl<P> Default for FlatIndex<P> {
    fn default() -> Self {
        Self::build(IndexConfig::default())
    }
}

impl<P> FlatIndex<P> {
    /// Create an empty index for vectors of length `dim`
    pub fn new(dim: usize) -> Result<Self> {
        Self::with_config(IndexConfig::default().with_dimension(dim))
    }

    /// Create an empty index from a configuration
    pub fn with_config(config: IndexConfig) -> Result<Self> {
        if config.dimension == Some(0) {
            return Err(IndexError::InvalidDimension(0));
        }
        Ok(Self::build(config))
    }

    fn build(config: IndexConfig) -> Self {
        let dim = config.dimension;
        let buffer = match dim {
            Some(d) => VectorBuffer::with_capacity(d, config.initial_capacity),
            None => VectorBuffer::new(0),
        };
        let payloads = Vec::with_capacity(if dim.is_some() {
            config.initial_capacity
        } else {
            0
        });
        let workers = config.resolved_workers();
        debug!(?dim, workers, "Created flat index");

        Self {
            normalizer: Normalizer::new(config.unit_epsilon),
            config,
            dim,
            workers,
            buffer,
            payloads,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Vector dimension, once known
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn state(&self) -> IndexState {
        match self.len() {
            0 => IndexState::Empty,
            n => IndexState::Populated(n),
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.buffer.contains(id)
    }

    /// Stored unit vector and payload for `id`
    pub fn get(&self, id: u64) -> Option<(&[f32], &P)> {
        let slot = self.buffer.slot_of(id)?;
        Some((self.buffer.get(slot)?, self.payloads.get(slot)?))
    }

    /// Entries in storage order (not insertion order once anything is removed)
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[f32], &P)> + '_ {
        self.buffer
            .ids()
            .iter()
            .enumerate()
            .filter_map(move |(slot, &id)| {
                Some((id, self.buffer.get(slot)?, self.payloads.get(slot)?))
            })
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        match self.dim {
            Some(expected) if expected != actual => {
                Err(IndexError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Insert a vector under `id`.
    ///
    /// The vector is normalized before it is stored. Fails on a dimension
    /// mismatch, an existing `id`, or a zero/non-finite vector; a failed
    /// insert leaves the index untouched.
    pub fn insert(&mut self, id: u64, vector: &[f32], payload: P) -> Result<()> {
        self.check_dimension(vector.len())?;
        if vector.is_empty() {
            return Err(IndexError::InvalidDimension(0));
        }
        if self.buffer.contains(id) {
            return Err(IndexError::DuplicateId(id));
        }
        let unit = self.normalizer.normalize(vector)?;
        self.push(id, &unit, payload);
        Ok(())
    }

    /// Insert a vector that is already unit length (restored from disk).
    pub(crate) fn insert_unit(&mut self, id: u64, unit: &UnitVector, payload: P) -> Result<()> {
        self.check_dimension(unit.dim())?;
        if unit.dim() == 0 {
            return Err(IndexError::InvalidDimension(0));
        }
        if self.buffer.contains(id) {
            return Err(IndexError::DuplicateId(id));
        }
        self.push(id, unit, payload);
        Ok(())
    }

    fn push(&mut self, id: u64, unit: &UnitVector, payload: P) {
        if self.dim.is_none() {
            let dim = unit.dim();
            debug!(dim, "Dimension fixed by first insert");
            self.dim = Some(dim);
            self.buffer = VectorBuffer::with_capacity(dim, self.config.initial_capacity);
            self.payloads.reserve(self.config.initial_capacity);
        }

        let slot = self.buffer.append(id, unit);
        debug_assert_eq!(slot, self.payloads.len());
        self.payloads.push(payload);
        trace!(id, slot, "Inserted vector");
    }

    /// Remove `id`, handing its payload back.
    pub fn remove(&mut self, id: u64) -> Result<P> {
        let slot = self.buffer.remove(id).ok_or(IndexError::NotFound(id))?;
        // Same swap-with-last as the buffer, so slots stay aligned
        let payload = self.payloads.swap_remove(slot);
        trace!(id, slot, "Removed vector");
        Ok(payload)
    }

    /// Remove every entry, keeping the dimension
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.payloads.clear();
    }

    /// Reserve room for `additional` more entries
    pub fn reserve(&mut self, additional: usize) {
        self.buffer.reserve(additional);
        self.payloads.reserve(additional);
    }

    pub fn shrink_to_fit(&mut self) {
        self.buffer.shrink_to_fit();
        self.payloads.shrink_to_fit();
    }

    /// Bytes held by stored vectors
    pub fn memory_bytes(&self) -> usize {
        self.buffer.memory_bytes()
    }

    /// Top `k` entries by cosine similarity to `vector`.
    ///
    /// Ordered by descending score, ties by ascending id. Returns fewer than
    /// `k` hits only when the index holds fewer entries. Scans large indexes
    /// on the configured worker count; the hits do not depend on it.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry<'_, P>>> {
        self.run_query(vector, k, self.default_workers(), None)
    }

    /// [`Self::query`] on exactly `workers` scan threads (1 = calling thread).
    pub fn query_with_workers(
        &self,
        vector: &[f32],
        k: usize,
        workers: usize,
    ) -> Result<Vec<ScoredEntry<'_, P>>> {
        self.run_query(vector, k, workers.max(1), None)
    }

    /// [`Self::query`] that fails with [`IndexError::Cancelled`] once `cancel`
    /// is raised. Partial results are discarded.
    pub fn query_cancellable(
        &self,
        vector: &[f32],
        k: usize,
        cancel: &AtomicBool,
    ) -> Result<Vec<ScoredEntry<'_, P>>> {
        self.run_query(vector, k, self.default_workers(), Some(cancel))
    }

    fn default_workers(&self) -> usize {
        if self.len() >= self.config.parallel_threshold {
            self.workers
        } else {
            1
        }
    }

    fn run_query(
        &self,
        vector: &[f32],
        k: usize,
        workers: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<ScoredEntry<'_, P>>> {
        self.check_dimension(vector.len())?;
        let query = self.normalizer.normalize(vector)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let topk = scan::scan(
            &self.buffer,
            &query,
            k,
            workers,
            self.config.score_block,
            cancel,
        )?;

        topk.into_sorted_vec()
            .into_iter()
            .map(|c| {
                self.buffer
                    .slot_of(c.id)
                    .map(|slot| ScoredEntry {
                        id: c.id,
                        score: c.score,
                        payload: &self.payloads[slot],
                    })
                    .ok_or(IndexError::NotFound(c.id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits<P>(entries: &[ScoredEntry<'_, P>]) -> Vec<(u64, f32)> {
        entries.iter().map(|e| (e.id, e.score)).collect()
    }

    fn create_test_index() -> FlatIndex<&'static str> {
        let mut index = FlatIndex::new(3).unwrap();
        index.insert(1, &[1.0, 0.0, 0.0], "x").unwrap();
        index.insert(2, &[0.0, 1.0, 0.0], "y").unwrap();
        index.insert(3, &[0.6, 0.8, 0.0], "xy").unwrap();
        index
    }

    #[test]
    fn test_query_ranks_by_cosine() {
        let index = create_test_index();
        let results = index.query(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(*results[0].payload, "x");
        assert_eq!(results[1].id, 3);
        assert!((results[1].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_query_normalizes_inputs() {
        let mut index = FlatIndex::new(2).unwrap();
        index.insert(1, &[10.0, 0.0], ()).unwrap();
        index.insert(2, &[3.0, 4.0], ()).unwrap();

        let results = index.query(&[0.0, 5.0], 2).unwrap();
        assert_eq!(results[0].id, 2);
        assert!((results[0].score - 0.8).abs() < 1e-6);
        assert!(results[1].score.abs() < 1e-6);
    }

    #[test]
    fn test_k_at_least_len_returns_all_sorted() {
        let mut index = FlatIndex::new(2).unwrap();
        index.insert(5, &[1.0, 1.0], ()).unwrap();
        index.insert(2, &[2.0, 2.0], ()).unwrap();
        index.insert(9, &[-1.0, 0.0], ()).unwrap();
        index.insert(4, &[1.0, 0.0], ()).unwrap();

        let results = index.query(&[1.0, 1.0], 10).unwrap();
        let ids: Vec<u64> = results.iter().map(|e| e.id).collect();
        // 5 and 2 share a direction, so the smaller id wins the tie
        assert_eq!(ids, vec![2, 5, 4, 9]);
        assert_eq!(results[0].score, results[1].score);
        assert!(results[2].score < results[1].score);
    }

    #[test]
    fn test_k_zero() {
        let index = create_test_index();
        assert!(index.query(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_query() {
        let index: FlatIndex<()> = FlatIndex::new(3).unwrap();
        assert_eq!(index.state(), IndexState::Empty);
        assert!(index.query(&[0.2, 0.3, 0.4], 5).unwrap().is_empty());
    }

    #[test]
    fn test_zero_vector_rejected() {
        let mut index: FlatIndex<()> = FlatIndex::new(3).unwrap();
        assert_eq!(
            index.insert(1, &[0.0, 0.0, 0.0], ()),
            Err(IndexError::DegenerateVector)
        );
        assert!(index.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = create_test_index();
        assert_eq!(
            index.query(&[1.0, 0.0], 1).map(|r| r.len()),
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            index.insert(7, &[1.0, 0.0, 0.0, 0.0], "w"),
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut index = create_test_index();
        assert_eq!(
            index.insert(2, &[0.0, 0.0, 1.0], "z"),
            Err(IndexError::DuplicateId(2))
        );
        let (vector, payload) = index.get(2).unwrap();
        assert_eq!(vector, &[0.0, 1.0, 0.0]);
        assert_eq!(*payload, "y");
    }

    #[test]
    fn test_remove() {
        let mut index = create_test_index();
        assert_eq!(index.remove(1), Ok("x"));
        assert_eq!(index.remove(1), Err(IndexError::NotFound(1)));
        assert_eq!(index.state(), IndexState::Populated(2));

        // Payloads follow their vectors through the swap
        let results = index.query(&[1.0, 0.0, 0.0], 5).unwrap();
        let pairs: Vec<(u64, &str)> = results.iter().map(|e| (e.id, *e.payload)).collect();
        assert_eq!(pairs, vec![(3, "xy"), (2, "y")]);
    }

    #[test]
    fn test_insert_then_remove_is_invisible() {
        let mut index = create_test_index();
        let before = hits(&index.query(&[0.5, 0.5, 0.1], 3).unwrap());

        index.insert(42, &[0.5, 0.5, 0.1], "probe").unwrap();
        index.remove(42).unwrap();

        assert_eq!(index.len(), 3);
        let after = hits(&index.query(&[0.5, 0.5, 0.1], 3).unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn test_dimension_fixed_by_first_insert() {
        let mut index: FlatIndex<u32> = FlatIndex::default();
        assert_eq!(index.dim(), None);
        assert!(index.query(&[1.0, 2.0], 3).unwrap().is_empty());

        index.insert(1, &[1.0, 2.0, 3.0, 4.0], 10).unwrap();
        assert_eq!(index.dim(), Some(4));
        assert!(matches!(
            index.insert(2, &[1.0, 2.0], 20),
            Err(IndexError::DimensionMismatch { expected: 4, .. })
        ));

        index.clear();
        assert_eq!(index.dim(), Some(4));
    }

    #[test]
    fn test_invalid_dimension() {
        assert!(matches!(
            FlatIndex::<()>::new(0),
            Err(IndexError::InvalidDimension(0))
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let config = IndexConfig::default()
            .with_dimension(16)
            .with_parallel_threshold(0)
            .with_scan_workers(4)
            .with_score_block(32);
        let mut index = FlatIndex::with_config(config).unwrap();
        for id in 0..2000u64 {
            let v: Vec<f32> = (0..16)
                .map(|d| ((id * 31 + d * 17) % 23) as f32 - 11.0)
                .collect();
            // Some rows normalize to zero; skip them
            let _ = index.insert(id, &v, id);
        }

        let query: Vec<f32> = (0..16).map(|d| (d as f32 * 0.7).sin()).collect();
        let sequential = hits(&index.query_with_workers(&query, 50, 1).unwrap());
        for workers in [2, 3, 7, 16] {
            let parallel = hits(&index.query_with_workers(&query, 50, workers).unwrap());
            assert_eq!(sequential, parallel, "workers={}", workers);
        }
        assert_eq!(sequential, hits(&index.query(&query, 50).unwrap()));
    }

    #[test]
    fn test_oversized_worker_count() {
        let config = IndexConfig::default()
            .with_dimension(2)
            .with_parallel_threshold(0)
            .with_score_block(1);
        let mut index = FlatIndex::with_config(config).unwrap();
        for id in 0..50_000u64 {
            let v = [(id % 97) as f32 - 48.0, (id % 89) as f32 + 1.0];
            index.insert(id, &v, ()).unwrap();
        }

        let sequential = hits(&index.query_with_workers(&[1.0, 0.5], 5, 1).unwrap());
        let wide = hits(&index.query_with_workers(&[1.0, 0.5], 5, 200_000).unwrap());
        assert_eq!(sequential.len(), 5);
        assert_eq!(sequential, wide);
    }

    #[test]
    fn test_empty_vector_on_unsized_index() {
        let mut index: FlatIndex<()> = FlatIndex::default();
        assert_eq!(index.insert(1, &[], ()), Err(IndexError::InvalidDimension(0)));
        assert_eq!(index.dim(), None);
        assert!(index.is_empty());
    }

    #[test]
    fn test_query_cancellable() {
        let index = create_test_index();
        let cancel = AtomicBool::new(false);
        assert_eq!(index.query_cancellable(&[1.0, 0.0, 0.0], 3, &cancel).unwrap().len(), 3);

        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        assert_eq!(
            index
                .query_cancellable(&[1.0, 0.0, 0.0], 3, &cancel)
                .map(|r| r.len()),
            Err(IndexError::Cancelled)
        );
    }

    #[test]
    fn test_iter_and_get() {
        let mut index = create_test_index();
        index.remove(2).unwrap();
        let mut ids: Vec<u64> = index.iter().map(|(id, _, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
        assert!(index.get(2).is_none());
        assert!(index.contains(3));
    }
}
