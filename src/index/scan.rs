//! Query Scan
//!
//! Drives the scoring kernel over the buffer and selects the top k. Large
//! buffers are split into contiguous slot ranges, one scoped worker each;
//! every worker keeps its own selector and the partial selectors are merged.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::error::{IndexError, Result};
use crate::vector::{score_batch_into, TopKSelector, VectorBuffer};

#[inline]
fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false)
}

/// Score slots `start..end` in blocks of `block` vectors.
fn scan_range(
    buffer: &VectorBuffer,
    query: &[f32],
    start: usize,
    end: usize,
    k: usize,
    block: usize,
    cancel: Option<&AtomicBool>,
) -> Result<TopKSelector> {
    let ids = buffer.ids();
    let block = block.max(1);
    let mut topk = TopKSelector::new(k);
    let mut scores = Vec::with_capacity(block.min(end - start));

    let mut slot = start;
    while slot < end {
        if is_cancelled(cancel) {
            return Err(IndexError::Cancelled);
        }

        let stop = (slot + block).min(end);
        score_batch_into(query, buffer.rows(slot, stop), &mut scores);
        for (&id, &score) in ids[slot..stop].iter().zip(scores.iter()) {
            topk.offer(id, score);
        }
        slot = stop;
    }

    Ok(topk)
}

/// Number of workers actually used for a scan of `len` slots.
///
/// Never more than the hardware parallelism, and every worker gets at
/// least one full score block.
pub(crate) fn effective_workers(len: usize, requested: usize, block: usize) -> usize {
    requested
        .min(num_cpus::get().max(1))
        .min(len.div_ceil(block.max(1)))
        .max(1)
}

/// Scan the whole buffer with up to `workers` threads.
///
/// The result is identical for every worker count and block size.
pub(crate) fn scan(
    buffer: &VectorBuffer,
    query: &[f32],
    k: usize,
    workers: usize,
    block: usize,
    cancel: Option<&AtomicBool>,
) -> Result<TopKSelector> {
    let len = buffer.len();
    let workers = effective_workers(len, workers, block);

    if workers == 1 {
        return scan_range(buffer, query, 0, len, k, block, cancel);
    }

    debug!(entries = len, workers, "Parallel scan");
    scan_split(len, k, workers, |start, end| {
        scan_range(buffer, query, start, end, k, block, cancel)
    })
}

/// Split `0..len` into `workers` contiguous ranges, run `score` on each in a
/// scoped thread and merge the partial selectors.
///
/// A range whose thread cannot be spawned is scored on the calling thread.
/// A panicking worker is re-raised here.
fn scan_split<F>(len: usize, k: usize, workers: usize, score: F) -> Result<TopKSelector>
where
    F: Fn(usize, usize) -> Result<TopKSelector> + Sync,
{
    let per_worker = len.div_ceil(workers.max(1)).max(1);
    let score = &score;

    let partials = crossbeam::thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        let mut inline: Vec<std::thread::Result<Result<TopKSelector>>> = Vec::new();

        for w in 0..workers {
            let (start, end) = (w * per_worker, ((w + 1) * per_worker).min(len));
            if start >= end {
                break;
            }
            match s
                .builder()
                .name(format!("flatrix-scan-{}", w))
                .spawn(move |_| score(start, end))
            {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(error = %e, worker = w, "Scan worker spawn failed, scoring inline");
                    inline.push(Ok(score(start, end)));
                }
            }
        }

        handles
            .into_iter()
            .map(|handle| handle.join())
            .chain(inline)
            .collect::<Vec<_>>()
    })
    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

    let mut topk = TopKSelector::new(k);
    for partial in partials {
        match partial {
            Ok(selector) => topk.merge(selector?),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
    Ok(topk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Normalizer;

    fn buffer(n: u64, dim: usize) -> VectorBuffer {
        let normalizer = Normalizer::default();
        let mut buffer = VectorBuffer::new(dim);
        for id in 0..n {
            let raw: Vec<f32> = (0..dim)
                .map(|d| (((id + 1) * (d as u64 + 3) * 2654435761) % 1000) as f32 - 500.0)
                .collect();
            if let Ok(unit) = normalizer.normalize(&raw) {
                buffer.append(id, &unit);
            }
        }
        buffer
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let buffer = buffer(500, 8);
        let query = Normalizer::default()
            .normalize(&[1.0, -2.0, 3.0, 0.5, 0.0, 1.0, 2.0, -1.0])
            .unwrap();

        let baseline = scan(&buffer, &query, 25, 1, 1024, None)
            .unwrap()
            .into_sorted_vec();
        for (workers, block) in [(2, 7), (3, 64), (8, 1), (64, 13), (1000, 5)] {
            let other = scan(&buffer, &query, 25, workers, block, None)
                .unwrap()
                .into_sorted_vec();
            let a: Vec<(u64, f32)> = baseline.iter().map(|c| (c.id, c.score)).collect();
            let b: Vec<(u64, f32)> = other.iter().map(|c| (c.id, c.score)).collect();
            assert_eq!(a, b, "workers={} block={}", workers, block);
        }
    }

    #[test]
    fn test_cancelled_scan_returns_error() {
        let buffer = buffer(100, 4);
        let query = Normalizer::default().normalize(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        let cancel = AtomicBool::new(true);

        assert_eq!(
            scan(&buffer, &query, 5, 1, 16, Some(&cancel)).map(|t| t.len()),
            Err(IndexError::Cancelled)
        );
        assert_eq!(
            scan(&buffer, &query, 5, 4, 16, Some(&cancel)).map(|t| t.len()),
            Err(IndexError::Cancelled)
        );
    }

    #[test]
    fn test_huge_worker_count_is_capped() {
        let buffer = buffer(20_000, 4);
        let query = Normalizer::default().normalize(&[0.5, -1.0, 2.0, 1.0]).unwrap();

        let baseline = scan(&buffer, &query, 10, 1, 1024, None).unwrap().into_sorted_vec();
        let wide = scan(&buffer, &query, 10, usize::MAX, 1, None).unwrap().into_sorted_vec();
        assert_eq!(baseline, wide);

        assert!(effective_workers(20_000, usize::MAX, 1) <= num_cpus::get().max(1));
        assert_eq!(effective_workers(10, 64, 16), 1);
        assert_eq!(effective_workers(0, 8, 16), 1);
        assert_eq!(effective_workers(1_000, 0, 16), 1);
    }

    #[test]
    fn test_split_merges_every_range() {
        let topk = scan_split(103, 4, 5, |start, end| {
            let mut topk = TopKSelector::new(4);
            for slot in start..end {
                topk.offer(slot as u64, (slot % 10) as f32);
            }
            Ok(topk)
        })
        .unwrap();
        let ids: Vec<u64> = topk.into_sorted_vec().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![9, 19, 29, 39]);
    }

    #[test]
    fn test_split_returns_worker_error() {
        let result = scan_split(100, 5, 4, |start, _end| {
            if start >= 50 {
                return Err(IndexError::Cancelled);
            }
            Ok(TopKSelector::new(5))
        });
        assert_eq!(result.map(|t| t.len()), Err(IndexError::Cancelled));
    }

    #[test]
    fn test_worker_panic_is_reraised() {
        let result = std::panic::catch_unwind(|| {
            scan_split(100, 5, 4, |start, _end| {
                if start > 0 {
                    panic!("scan worker failed");
                }
                Ok(TopKSelector::new(5))
            })
        });
        let panic = result.err().unwrap();
        assert_eq!(panic.downcast_ref::<&str>(), Some(&"scan worker failed"));
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = VectorBuffer::new(3);
        let query = Normalizer::default().normalize(&[1.0, 0.0, 0.0]).unwrap();
        assert!(scan(&buffer, &query, 5, 4, 16, None).unwrap().is_empty());
    }
}
