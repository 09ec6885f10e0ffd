//! Vector Module
//!
//! Normalization, flat vector storage, the dot-product scoring kernel and
//! bounded top-k selection.

mod buffer;
mod normalize;
mod similarity;
mod topk;

pub use buffer::VectorBuffer;
pub use normalize::{check_finite, magnitude, Normalizer, UnitVector, DEFAULT_UNIT_EPSILON};
pub use similarity::{cosine_similarity, dot_product, score_batch, score_batch_into};
pub use topk::{Candidate, TopKSelector};
