//! FLATRIX - Exact In-Memory Vector Similarity Index
//!
//! Brute-force cosine top-k over unit-normalized embeddings stored in one
//! contiguous buffer, with a chunked parallel scan and deterministic ranking.

pub mod error;
pub mod index;
pub mod metrics;
pub mod persistence;
pub mod vector;

pub use error::{IndexError, Result};
pub use index::{FlatIndex, IndexConfig, IndexState, QueryHit, ScoredEntry, SharedIndex};
pub use metrics::{IndexMetrics, Operation};
pub use persistence::{Snapshot, SnapshotConfig, SnapshotError};
pub use vector::{Normalizer, TopKSelector, UnitVector, VectorBuffer};

/// Create an empty index for vectors of length `dim`
pub fn create_index<P>(dim: usize) -> Result<FlatIndex<P>> {
    FlatIndex::new(dim)
}
