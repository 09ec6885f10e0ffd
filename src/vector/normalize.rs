//! Vector Normalization
//!
//! Unit-length conversion applied once at insertion and once per query.

use std::ops::Deref;

use crate::error::{IndexError, Result};

/// Default tolerance under which a magnitude counts as already unit
pub const DEFAULT_UNIT_EPSILON: f32 = 1e-6;

/// A vector with magnitude 1 (within rounding)
///
/// Only [`Normalizer`] and snapshot loading construct these, so every
/// stored vector has been normalized exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitVector(Vec<f32>);

impl UnitVector {
    /// Wrap components that were normalized before they were persisted.
    pub(crate) fn from_stored(components: Vec<f32>) -> Self {
        Self(components)
    }

    /// Dimension of the vector
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl Deref for UnitVector {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl AsRef<[f32]> for UnitVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Euclidean magnitude, accumulated in f64 so large components cannot overflow.
#[inline]
pub fn magnitude(v: &[f32]) -> f64 {
    v.iter()
        .map(|&x| {
            let x = x as f64;
            x * x
        })
        .sum::<f64>()
        .sqrt()
}

/// Rejects NaN and infinite components.
pub fn check_finite(v: &[f32]) -> Result<()> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(IndexError::NonFiniteComponent { index }),
        None => Ok(()),
    }
}

/// Produces unit vectors from raw input
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    /// Magnitudes within this distance of 1 skip the division
    unit_epsilon: f32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_UNIT_EPSILON)
    }
}

impl Normalizer {
    pub fn new(unit_epsilon: f32) -> Self {
        Self {
            unit_epsilon: unit_epsilon.max(0.0),
        }
    }

    pub fn unit_epsilon(&self) -> f32 {
        self.unit_epsilon
    }

    /// Normalize `v` to unit length.
    ///
    /// Fails with [`IndexError::NonFiniteComponent`] on NaN/inf input and with
    /// [`IndexError::DegenerateVector`] on a zero vector.
    pub fn normalize(&self, v: &[f32]) -> Result<UnitVector> {
        check_finite(v)?;

        let mag = magnitude(v);
        if mag == 0.0 {
            return Err(IndexError::DegenerateVector);
        }

        if (mag - 1.0).abs() <= self.unit_epsilon as f64 {
            return Ok(UnitVector(v.to_vec()));
        }

        Ok(UnitVector(
            v.iter().map(|&x| (x as f64 / mag) as f32).collect(),
        ))
    }
}
