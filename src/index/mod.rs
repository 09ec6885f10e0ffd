//! Index Module
//!
//! The flat index, its configuration, the parallel query scan and a
//! lock-protected shared handle.

mod config;
mod flat;
mod scan;
mod shared;

pub use config::IndexConfig;
pub use flat::{FlatIndex, IndexState, ScoredEntry};
pub use shared::{QueryHit, SharedIndex};
