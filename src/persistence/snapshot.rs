//! Snapshot Persistence
//!
//! Point-in-time dump of a flat index and its payloads.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::IndexError;
use crate::index::{FlatIndex, IndexConfig};
use crate::vector::{check_finite, magnitude, UnitVector};

/// Snapshot configuration
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Directory for snapshot files
    pub dir: PathBuf,
    /// Maximum number of snapshots to keep
    pub max_snapshots: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/snapshots"),
            max_snapshots: 5,
        }
    }
}

impl SnapshotConfig {
    pub fn with_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }
}

/// Snapshot errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid snapshot magic")]
    InvalidMagic,

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("Index too large for snapshot: {0}")]
    TooLarge(String),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

/// Snapshot file format (little endian):
/// - Magic: 4 bytes "FLTX"
/// - Version: 1 byte
/// - Timestamp: 8 bytes (unix millis)
/// - Dimension: 4 bytes (0 = not yet fixed)
/// - Entry count: 4 bytes
/// - Entries: [id (8) + payload_len (4) + payload + dim * f32]*

const SNAPSHOT_MAGIC: &[u8] = b"FLTX";
const SNAPSHOT_VERSION: u8 = 1;
const SNAPSHOT_EXTENSION: &str = "flx";
const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Serialize `index` to `writer`.
pub fn write_to<P, W>(index: &FlatIndex<P>, writer: W) -> SnapshotResult<()>
where
    P: AsRef<[u8]>,
    W: Write,
{
    // Reject anything read_from would refuse before writing a byte
    let dim = index.dim().unwrap_or(0);
    let dim = u32::try_from(dim)
        .map_err(|_| SnapshotError::TooLarge(format!("dimension {}", dim)))?;
    let count = u32::try_from(index.len())
        .map_err(|_| SnapshotError::TooLarge(format!("{} entries", index.len())))?;
    for (id, _, payload) in index.iter() {
        let len = payload.as_ref().len();
        if len > MAX_PAYLOAD_LEN {
            return Err(SnapshotError::TooLarge(format!(
                "payload of {} bytes for id {}",
                len, id
            )));
        }
    }

    let mut writer = BufWriter::new(writer);

    // Write header
    writer.write_all(SNAPSHOT_MAGIC)?;
    writer.write_all(&[SNAPSHOT_VERSION])?;
    writer.write_all(&chrono::Utc::now().timestamp_millis().to_le_bytes())?;
    writer.write_all(&dim.to_le_bytes())?;
    writer.write_all(&count.to_le_bytes())?;

    // Write entries
    for (id, vector, payload) in index.iter() {
        let payload: &[u8] = payload.as_ref();
        writer.write_all(&id.to_le_bytes())?;
        // Bounded by MAX_PAYLOAD_LEN above
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(payload)?;
        for x in vector {
            writer.write_all(&x.to_le_bytes())?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn read_array<const N: usize, R: Read>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Rebuild an index from `reader`.
///
/// Stored vectors are already unit length and are appended without being
/// normalized again. `config.dimension`, when set, must match the file.
pub fn read_from<P, R>(reader: R, mut config: IndexConfig) -> SnapshotResult<FlatIndex<P>>
where
    P: From<Vec<u8>>,
    R: Read,
{
    let mut reader = BufReader::new(reader);

    // Read header
    let magic: [u8; 4] = read_array(&mut reader)?;
    if &magic[..] != SNAPSHOT_MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }

    let [version] = read_array::<1, _>(&mut reader)?;
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    let timestamp = i64::from_le_bytes(read_array(&mut reader)?);
    let dim = u32::from_le_bytes(read_array(&mut reader)?) as usize;
    let count = u32::from_le_bytes(read_array(&mut reader)?) as usize;
    debug!(timestamp, dim, count, "Reading snapshot");

    if dim == 0 && count > 0 {
        return Err(SnapshotError::Corrupt(format!(
            "{} entries with zero dimension",
            count
        )));
    }
    if dim > 0 {
        if let Some(expected) = config.dimension {
            if expected != dim {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: dim,
                }
                .into());
            }
        }
        config.dimension = Some(dim);
    }

    let mut index = FlatIndex::with_config(config)?;
    index.reserve(count);

    let mut vector_buf = vec![0u8; dim * 4];
    for _ in 0..count {
        let id = u64::from_le_bytes(read_array(&mut reader)?);

        let payload_len = u32::from_le_bytes(read_array(&mut reader)?) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(SnapshotError::Corrupt(format!(
                "payload of {} bytes for id {}",
                payload_len, id
            )));
        }
        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        reader.read_exact(&mut vector_buf)?;
        let vector: Vec<f32> = vector_buf
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if check_finite(&vector).is_err() || magnitude(&vector) == 0.0 {
            return Err(SnapshotError::Corrupt(format!(
                "invalid vector for id {}",
                id
            )));
        }

        index.insert_unit(id, &UnitVector::from_stored(vector), P::from(payload))?;
    }

    Ok(index)
}

/// Snapshot writer/reader
pub struct Snapshot {
    config: SnapshotConfig,
}

impl Snapshot {
    pub fn new(config: SnapshotConfig) -> io::Result<Self> {
        fs::create_dir_all(&config.dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Generate an unused snapshot filename from the current time
    fn snapshot_filename(&self) -> PathBuf {
        let mut millis = chrono::Utc::now().timestamp_millis().max(0);
        loop {
            let path = self
                .config
                .dir
                .join(format!("snapshot_{:013}.{}", millis, SNAPSHOT_EXTENSION));
            if !path.exists() {
                return path;
            }
            millis += 1;
        }
    }

    /// Write a snapshot
    ///
    /// The file is written under a temporary name and renamed into place,
    /// so a failed save never shows up in [`Snapshot::list_snapshots`].
    pub fn save<P: AsRef<[u8]>>(&self, index: &FlatIndex<P>) -> SnapshotResult<PathBuf> {
        let path = self.snapshot_filename();
        let tmp_path = path.with_extension(format!("{}.tmp", SNAPSHOT_EXTENSION));

        let written = File::create(&tmp_path)
            .map_err(SnapshotError::from)
            .and_then(|file| {
                write_to(index, &file)?;
                file.sync_all()?;
                Ok(())
            });
        if let Err(e) = written {
            warn!(path = %tmp_path.display(), error = %e, "Snapshot save failed");
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, &path)?;
        info!(path = %path.display(), entries = index.len(), "Snapshot saved");

        self.cleanup_old_snapshots()?;
        Ok(path)
    }

    /// Load the latest snapshot
    pub fn load_latest<P: From<Vec<u8>>>(
        &self,
        config: IndexConfig,
    ) -> SnapshotResult<Option<FlatIndex<P>>> {
        match self.list_snapshots()?.pop() {
            Some(path) => Ok(Some(self.load(&path, config)?)),
            None => Ok(None),
        }
    }

    /// Load a specific snapshot file
    pub fn load<P: From<Vec<u8>>>(
        &self,
        path: &Path,
        config: IndexConfig,
    ) -> SnapshotResult<FlatIndex<P>> {
        let index = read_from(File::open(path)?, config)?;
        info!(path = %path.display(), entries = index.len(), "Snapshot loaded");
        Ok(index)
    }

    /// Snapshot files, oldest first
    ///
    /// Names embed a zero-padded timestamp, so name order is age order.
    pub fn list_snapshots(&self) -> io::Result<Vec<PathBuf>> {
        let mut snapshots: Vec<PathBuf> = fs::read_dir(&self.config.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext == SNAPSHOT_EXTENSION)
                    .unwrap_or(false)
            })
            .collect();
        snapshots.sort();
        Ok(snapshots)
    }

    /// Remove old snapshots beyond max_snapshots
    fn cleanup_old_snapshots(&self) -> io::Result<()> {
        let snapshots = self.list_snapshots()?;
        let excess = snapshots.len().saturating_sub(self.config.max_snapshots.max(1));

        for path in snapshots.into_iter().take(excess) {
            debug!(path = %path.display(), "Removing old snapshot");
            fs::remove_file(path)?;
        }

        Ok(())
    }
}
