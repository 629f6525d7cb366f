//! Error policies measuring the distance between network output and a
//! reference vector.

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Pluggable error function.
pub trait ErrorFunction: Send {
    /// Scalar error of `result` against `reference`. Both have equal length.
    fn value(&self, result: &[f64], reference: &[f64]) -> f64;

    /// Partial derivative of the error by `result[index]`.
    fn derivative(&self, result: &[f64], reference: &[f64], index: usize) -> f64;

    /// Check internal parameters before the function is used.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InvalidPolicy`] when a parameter is out of range.
    fn check_validity(&self) -> Result<(), GenerationError>;
}

/// `0.5 · Σ (r_i - t_i)²`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadraticError;

impl ErrorFunction for QuadraticError {
    fn value(&self, result: &[f64], reference: &[f64]) -> f64 {
        0.5 * result
            .iter()
            .zip(reference)
            .map(|(r, t)| (r - t) * (r - t))
            .sum::<f64>()
    }

    #[inline]
    fn derivative(&self, result: &[f64], reference: &[f64], index: usize) -> f64 {
        result[index] - reference[index]
    }

    fn check_validity(&self) -> Result<(), GenerationError> {
        Ok(())
    }
}

/// p-norm of the difference vector, `(Σ |r_i - t_i|^p)^(1/p)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PNorm {
    /// Exponent. Must be at least 1.
    pub p: f64,
}

impl PNorm {
    /// p-norm with exponent `p`.
    #[must_use]
    pub const fn new(p: f64) -> Self {
        Self { p }
    }

    fn power_sum(&self, result: &[f64], reference: &[f64]) -> f64 {
        result
            .iter()
            .zip(reference)
            .map(|(r, t)| (r - t).abs().powf(self.p))
            .sum()
    }
}

impl ErrorFunction for PNorm {
    fn value(&self, result: &[f64], reference: &[f64]) -> f64 {
        self.power_sum(result, reference).powf(1.0 / self.p)
    }

    /// `(Σ|d|^p)^(1/p - 1) · |d_i|^(p-1) · sign(d_i)`, zero where `d_i = 0`.
    fn derivative(&self, result: &[f64], reference: &[f64], index: usize) -> f64 {
        let diff = result[index] - reference[index];
        if diff == 0.0 {
            return 0.0;
        }
        let sum = self.power_sum(result, reference);
        let magnitude = sum.powf(1.0 / self.p - 1.0) * diff.abs().powf(self.p - 1.0);
        magnitude.copysign(diff)
    }

    fn check_validity(&self) -> Result<(), GenerationError> {
        if self.p >= 1.0 {
            Ok(())
        } else {
            Err(GenerationError::InvalidPolicy(format!(
                "p-norm exponent must not be less than 1, got {}",
                self.p
            )))
        }
    }
}
