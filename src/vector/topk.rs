//! Top-K Selection
//!
//! Bounded min-heap that keeps the best `k` candidates of a score stream.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A scored id awaiting selection
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: u64,
    pub score: f32,
}

impl Candidate {
    pub fn new(id: u64, score: f32) -> Self {
        Self { id, score }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Greater means ranks higher: higher score, then smaller id.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Keeps the `k` highest-ranking candidates seen so far
///
/// The ranking is a strict total order, so the selected set does not depend
/// on arrival order. Partial selectors built over disjoint chunks merge into
/// the same result a single sequential pass would produce.
#[derive(Debug, Clone)]
pub struct TopKSelector {
    k: usize,
    /// Min-heap: the root is the current worst kept candidate
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl TopKSelector {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            // k may be far larger than the corpus; cap the upfront allocation
            heap: BinaryHeap::with_capacity(k.min(1024) + 1),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Worst candidate currently kept
    pub fn threshold(&self) -> Option<Candidate> {
        self.heap.peek().map(|r| r.0)
    }

    /// Offer a candidate; returns whether it was kept.
    #[inline]
    pub fn push(&mut self, candidate: Candidate) -> bool {
        if self.k == 0 {
            return false;
        }
        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
            return true;
        }
        match self.heap.peek_mut() {
            Some(mut worst) if candidate > worst.0 => {
                *worst = Reverse(candidate);
                true
            }
            _ => false,
        }
    }

    /// Offer a score for `id`
    #[inline]
    pub fn offer(&mut self, id: u64, score: f32) -> bool {
        self.push(Candidate::new(id, score))
    }

    /// Fold another selector's candidates into this one
    pub fn merge(&mut self, other: TopKSelector) {
        for Reverse(candidate) in other.heap {
            self.push(candidate);
        }
    }

    /// Drain into best-first order: score descending, id ascending on ties.
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        // Ascending Reverse<_> is descending rank
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(c)| c)
            .collect()
    }
}
