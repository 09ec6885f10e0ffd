//! Shared Index
//!
//! Thread-safe handle around a [`FlatIndex`]: writers take the lock
//! exclusively, queries share it.

use parking_lot::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::metrics::{IndexMetrics, Operation};

use super::flat::{FlatIndex, ScoredEntry};

/// Owned query hit, returned once the read lock is released
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit<P> {
    pub id: u64,
    pub score: f32,
    pub payload: P,
}

impl<P: Clone> From<ScoredEntry<'_, P>> for QueryHit<P> {
    fn from(entry: ScoredEntry<'_, P>) -> Self {
        Self {
            id: entry.id,
            score: entry.score,
            payload: entry.payload.clone(),
        }
    }
}

/// Cloneable, lock-protected flat index
///
/// Payloads are cloned out of query results, so cheap handles such as
/// `Arc<T>` or `bytes::Bytes` make good payload types.
pub struct SharedIndex<P> {
    inner: Arc<RwLock<FlatIndex<P>>>,
    metrics: Arc<IndexMetrics>,
}

impl<P> Clone for SharedIndex<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<P> SharedIndex<P> {
    pub fn new(index: FlatIndex<P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
            metrics: Arc::new(IndexMetrics::new()),
        }
    }

    /// Metrics for every call made through this handle and its clones
    pub fn metrics(&self) -> &Arc<IndexMetrics> {
        &self.metrics
    }

    fn timed<T>(&self, op: Operation, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        self.metrics.record(op, start.elapsed(), result.is_ok());
        result
    }

    pub fn insert(&self, id: u64, vector: &[f32], payload: P) -> Result<()> {
        self.timed(Operation::Insert, || {
            self.inner.write().insert(id, vector, payload)
        })
    }

    pub fn remove(&self, id: u64) -> Result<P> {
        self.timed(Operation::Remove, || self.inner.write().remove(id))
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner.read().contains(id)
    }

    /// Run `f` against the index under the read lock
    pub fn with_read<R>(&self, f: impl FnOnce(&FlatIndex<P>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` against the index under the write lock
    pub fn with_write<R>(&self, f: impl FnOnce(&mut FlatIndex<P>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl<P: Clone> SharedIndex<P> {
    /// Top `k` hits for `vector`; see [`FlatIndex::query`].
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit<P>>> {
        self.timed(Operation::Query, || {
            let index = self.inner.read();
            let hits = index.query(vector, k)?;
            Ok(hits.into_iter().map(QueryHit::from).collect())
        })
    }

    /// Cancellable query; see [`FlatIndex::query_cancellable`].
    pub fn query_cancellable(
        &self,
        vector: &[f32],
        k: usize,
        cancel: &AtomicBool,
    ) -> Result<Vec<QueryHit<P>>> {
        self.timed(Operation::Query, || {
            let index = self.inner.read();
            let hits = index.query_cancellable(vector, k, cancel)?;
            Ok(hits.into_iter().map(QueryHit::from).collect())
        })
    }
}

impl<P> From<FlatIndex<P>> for SharedIndex<P> {
    fn from(index: FlatIndex<P>) -> Self {
        Self::new(index)
    }
}
