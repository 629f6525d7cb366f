//! Activation policies.
//!
//! An activation maps a neuron's linear combination to its result. To be
//! usable by the forward evaluators and backpropagation it must be monotonic,
//! differentiable and map into `[0, 1]`.

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Pluggable activation function.
pub trait ActivationFunction: Send {
    /// Activation value for a linear combination `x`, in `[0, 1]`.
    fn value(&self, x: f64) -> f64;

    /// Derivative at `x`, given the already computed `value(x)`.
    fn derivative(&self, x: f64, value: f64) -> f64;

    /// Check internal parameters before the function is used.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InvalidPolicy`] when a parameter is out of range.
    fn check_validity(&self) -> Result<(), GenerationError>;
}

/// Logistic sigmoid `1 / (1 + e^(-a·x))` with flatness ratio `a`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sigmoid {
    /// Flatness ratio `a`. Must be positive.
    pub flatness: f64,
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self { flatness: 1.0 }
    }
}

impl Sigmoid {
    /// Sigmoid with the given flatness ratio.
    #[must_use]
    pub const fn new(flatness: f64) -> Self {
        Self { flatness }
    }
}

impl ActivationFunction for Sigmoid {
    #[inline]
    fn value(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        // sigmoid(+inf) = 1, sigmoid(-inf) = 0; clamp keeps exp() finite.
        let scaled = (self.flatness * x).clamp(-700.0, 700.0);
        1.0 / (1.0 + (-scaled).exp())
    }

    #[inline]
    fn derivative(&self, _x: f64, value: f64) -> f64 {
        self.flatness * value * (1.0 - value)
    }

    fn check_validity(&self) -> Result<(), GenerationError> {
        if self.flatness > 0.0 {
            Ok(())
        } else {
            Err(GenerationError::InvalidPolicy(format!(
                "flatness ratio of sigmoid function must be a positive number, got {}",
                self.flatness
            )))
        }
    }
}
