//! FLATRIX Bench Binary
//!
//! Builds a random index, runs a query workload and cross-checks the
//! parallel scan against the sequential one.

use bytes::Bytes;
use clap::Parser;
use flatrix::{FlatIndex, IndexConfig, SharedIndex, Snapshot, SnapshotConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// FLATRIX Bench - Exact Vector Search Workload
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Vector dimension
    #[arg(short, long, default_value_t = 768)]
    dim: usize,

    /// Number of vectors to index
    #[arg(short = 'n', long, default_value_t = 100_000)]
    count: u64,

    /// Number of queries to run
    #[arg(short, long, default_value_t = 100)]
    queries: usize,

    /// Results per query
    #[arg(short, long, default_value_t = 10)]
    k: usize,

    /// Scan worker threads (0 = auto-detect based on CPU cores)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Minimum index size before scans run in parallel
    #[arg(long, default_value_t = 4096)]
    parallel_threshold: usize,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Save a snapshot of the index into this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

fn random_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("flatrix=info".parse()?))
        .init();

    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let config = IndexConfig::default()
        .with_dimension(args.dim)
        .with_scan_workers(args.workers)
        .with_parallel_threshold(args.parallel_threshold)
        .with_capacity(args.count as usize);
    let workers = config.resolved_workers();
    let index = SharedIndex::new(FlatIndex::with_config(config)?);

    info!(
        "Building index: {} vectors of dim {} ({} scan workers)",
        args.count, args.dim, workers
    );
    let start = Instant::now();
    for id in 0..args.count {
        let vector = random_vector(&mut rng, args.dim);
        index.insert(id, &vector, Bytes::from(format!("doc-{}", id)))?;
    }
    info!(
        "Indexed {} vectors in {:.2?} ({} MiB)",
        index.len(),
        start.elapsed(),
        index.with_read(|i| i.memory_bytes()) / (1024 * 1024)
    );

    let queries: Vec<Vec<f32>> = (0..args.queries)
        .map(|_| random_vector(&mut rng, args.dim))
        .collect();

    let start = Instant::now();
    for query in &queries {
        index.query(query, args.k)?;
    }
    let elapsed = start.elapsed();
    info!(
        "{} queries in {:.2?} ({:.1} qps)",
        queries.len(),
        elapsed,
        queries.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    // Parallel and sequential scans must agree exactly
    let mismatches = index.with_read(|i| -> flatrix::Result<usize> {
        let mut mismatches = 0;
        for query in queries.iter().take(10) {
            let sequential = i.query_with_workers(query, args.k, 1)?;
            let parallel = i.query_with_workers(query, args.k, workers)?;
            let same = sequential.len() == parallel.len()
                && sequential
                    .iter()
                    .zip(parallel.iter())
                    .all(|(a, b)| a.id == b.id && a.score == b.score);
            if !same {
                mismatches += 1;
            }
        }
        Ok(mismatches)
    })?;
    if mismatches > 0 {
        warn!("{} queries differed between sequential and parallel scans", mismatches);
    } else {
        info!("Sequential and parallel scans agree");
    }

    if let Some(dir) = args.snapshot_dir {
        let snapshot = Snapshot::new(SnapshotConfig::default().with_dir(dir))?;
        let path = index.with_read(|i| snapshot.save(i))?;
        info!("Snapshot written to {}", path.display());
    }

    println!("{}", index.metrics().summary());
    Ok(())
}
