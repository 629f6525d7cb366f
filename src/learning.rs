//! Learning policies.

use crate::error::{GenerationError, RuntimeError};
use crate::error_function::ErrorFunction;
use crate::evaluator::ForwardEvaluator;
use crate::state::StateView;

/// Learning rate used by [`Backpropagation::new`].
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;

/// Pluggable learning step run after a forward pass.
///
/// Like evaluators, a learner belongs to exactly one network.
pub trait Learner: Send {
    /// Update weights and biases towards `reference`, using the state left
    /// by the last forward pass of `evaluator`.
    ///
    /// # Errors
    ///
    /// A [`RuntimeError`] if `reference` or `evaluator` is unsuitable; the
    /// state is unchanged in that case.
    fn process(
        &mut self,
        state: &mut StateView<'_>,
        reference: &[f64],
        evaluator: &dyn ForwardEvaluator,
    ) -> Result<(), RuntimeError>;

    /// Validate a training request without touching any state.
    ///
    /// Networks call this before a combined forward and learning step so a
    /// rejected request leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// The [`RuntimeError`] [`process`](Self::process) would return for the
    /// same arguments.
    fn check_request(
        &self,
        reference: &[f64],
        output_size: usize,
        evaluator: &dyn ForwardEvaluator,
    ) -> Result<(), RuntimeError>;

    /// Check the policy before it is bound to a network.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InvalidPolicy`] when a parameter is out of range.
    fn check_validity(&self) -> Result<(), GenerationError>;

    /// Current scalar error of `output` against `reference`.
    fn error_value(&self, output: &[f64], reference: &[f64]) -> f64;
}

/// Reference vectors must match the output size and lie in `[0, 1]`.
///
/// # Errors
///
/// [`RuntimeError::ReferenceCardinality`] or [`RuntimeError::ReferenceOutOfRange`].
pub fn check_reference(reference: &[f64], output_size: usize) -> Result<(), RuntimeError> {
    if reference.len() != output_size {
        return Err(RuntimeError::ReferenceCardinality {
            expected: output_size,
            actual: reference.len(),
        });
    }
    match reference
        .iter()
        .position(|value| !(0.0..=1.0).contains(value))
    {
        Some(index) => Err(RuntimeError::ReferenceOutOfRange {
            index,
            value: reference[index],
        }),
        None => Ok(()),
    }
}

/// Gradient descent through the evaluation order in reverse.
#[derive(Debug, Clone)]
pub struct Backpropagation<E> {
    error_function: E,
    learning_rate: f64,
    /// dE/dS per source, reused between calls.
    gradient: Vec<f64>,
}

impl<E: ErrorFunction> Backpropagation<E> {
    /// Learner with [`DEFAULT_LEARNING_RATE`].
    #[must_use]
    pub fn new(error_function: E) -> Self {
        Self {
            error_function,
            learning_rate: DEFAULT_LEARNING_RATE,
            gradient: Vec::new(),
        }
    }

    /// Learner with an explicit rate.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InvalidPolicy`] unless `learning_rate` is in `(0, 1]`.
    pub fn with_learning_rate(error_function: E, learning_rate: f64) -> Result<Self, GenerationError> {
        let learner = Self {
            learning_rate,
            ..Self::new(error_function)
        };
        learner.check_learning_rate()?;
        Ok(learner)
    }

    /// Step size applied to every gradient.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// The error being minimized.
    #[must_use]
    pub fn error_function(&self) -> &E {
        &self.error_function
    }

    fn check_learning_rate(&self) -> Result<(), GenerationError> {
        if self.learning_rate > 0.0 && self.learning_rate <= 1.0 {
            Ok(())
        } else {
            Err(GenerationError::InvalidPolicy(format!(
                "learning rate must be in (0, 1], got {}",
                self.learning_rate
            )))
        }
    }
}

impl<E: ErrorFunction> Learner for Backpropagation<E> {
    fn process(
        &mut self,
        state: &mut StateView<'_>,
        reference: &[f64],
        evaluator: &dyn ForwardEvaluator,
    ) -> Result<(), RuntimeError> {
        self.check_request(reference, state.output_size(), evaluator)?;
        let activation = evaluator
            .differentiable_activation()
            .ok_or(RuntimeError::NonDifferentiableEvaluator)?;

        let topology = state.topology;
        let surface_first = topology.first_surface();
        let rate = self.learning_rate;

        let gradient = &mut self.gradient;
        gradient.clear();
        gradient.resize(topology.total_sources(), 0.0);

        // dE/dS = dE/dR · dR/dS on the surface.
        let output = state.output().to_vec();
        for i in 0..output.len() {
            let s = surface_first + i;
            gradient[s] = self.error_function.derivative(&output, reference, i)
                * activation.derivative(state.linear_combination[s], state.result[s]);
        }

        // Reverse order: each neuron's gradient is complete once all of its
        // children have been processed.
        for &neuron in topology.evaluation_order().iter().rev() {
            let delta = gradient[neuron];
            let weights = &mut state.weight[neuron];
            for (weight, &parent) in weights.iter_mut().zip(topology.parents(neuron)) {
                gradient[parent] += delta
                    * *weight
                    * activation.derivative(state.linear_combination[parent], state.result[parent]);
                *weight -= rate * delta * state.result[parent];
            }
            state.bias[neuron] -= rate * delta;
        }
        Ok(())
    }

    fn check_request(
        &self,
        reference: &[f64],
        output_size: usize,
        evaluator: &dyn ForwardEvaluator,
    ) -> Result<(), RuntimeError> {
        check_reference(reference, output_size)?;
        if evaluator.differentiable_activation().is_none() {
            return Err(RuntimeError::NonDifferentiableEvaluator);
        }
        Ok(())
    }

    fn check_validity(&self) -> Result<(), GenerationError> {
        self.check_learning_rate()?;
        self.error_function.check_validity()
    }

    fn error_value(&self, output: &[f64], reference: &[f64]) -> f64 {
        self.error_function.value(output, reference)
    }
}
