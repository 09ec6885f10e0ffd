//! Persistence Module
//!
//! Minimal snapshot load/save for flat indexes.

mod snapshot;

pub use snapshot::{
    read_from, write_to, Snapshot, SnapshotConfig, SnapshotError, SnapshotResult,
};
