//! Vector Similarity Functions
//!
//! Fused dot-product kernel used by the index scan.

/// Compute dot product of two vectors
///
/// Uses unrolled loop with independent accumulators for better CPU performance.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len().min(b.len());
    let chunks = len / 4;
    let mut acc = [0.0f32; 4];

    for i in 0..chunks {
        let idx = i * 4;
        acc[0] += a[idx] * b[idx];
        acc[1] += a[idx + 1] * b[idx + 1];
        acc[2] += a[idx + 2] * b[idx + 2];
        acc[3] += a[idx + 3] * b[idx + 3];
    }

    let mut sum = (acc[0] + acc[1]) + (acc[2] + acc[3]);

    // Handle remainder
    for i in (chunks * 4)..len {
        sum += a[i] * b[i];
    }

    sum
}

/// Compute cosine similarity between two raw vectors
///
/// Returns value in range [-1, 1] where 1 means identical direction, and 0.0
/// when either side has zero magnitude. The index never calls this: stored
/// and query vectors are unit length, so [`dot_product`] already is the cosine.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let dot = dot_product(a, b);
    let mag_a = dot_product(a, a).sqrt();
    let mag_b = dot_product(b, b).sqrt();

    let denom = mag_a * mag_b;
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

/// Score a query against a contiguous block of stored vectors.
///
/// `vectors` holds `vectors.len() / query.len()` rows of stride `query.len()`.
/// One score per row, appended to `out` after clearing it. Each score depends
/// only on its own row, so splitting a scan into blocks never changes a score.
pub fn score_batch_into(query: &[f32], vectors: &[f32], out: &mut Vec<f32>) {
    out.clear();
    let dim = query.len();
    if dim == 0 {
        return;
    }
    debug_assert_eq!(vectors.len() % dim, 0, "block is not a whole number of rows");

    out.reserve(vectors.len() / dim);
    out.extend(vectors.chunks_exact(dim).map(|row| dot_product(query, row)));
}

/// Allocating form of [`score_batch_into`].
pub fn score_batch(query: &[f32], vectors: &[f32]) -> Vec<f32> {
    let mut out = Vec::new();
    score_batch_into(query, vectors, &mut out);
    out
}
