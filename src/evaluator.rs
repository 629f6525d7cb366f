//! Forward evaluation policies.
//!
//! An evaluator walks the topology's evaluation order once, computing for
//! every neuron `linear_combination = bias + Σ weight[k] · result[parents[k]]`
//! and then its result. Input coordinates must already sit in `result`.

use rand::{Rng, RngCore};

use crate::activation::ActivationFunction;
use crate::error::GenerationError;
use crate::state::StateView;

/// Pluggable forward pass.
///
/// An instance may keep state tied to the one network that owns it and must
/// not be shared between networks.
pub trait ForwardEvaluator: Send {
    /// Recompute `linear_combination` and `result` of every neuron.
    fn process(&mut self, state: &mut StateView<'_>);

    /// Check the policy before it is bound to a network.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InvalidPolicy`] when a parameter is out of range.
    fn check_validity(&self) -> Result<(), GenerationError>;

    /// The activation used, if results are a differentiable function of the
    /// linear combination. Gradient training requires `Some`.
    fn differentiable_activation(&self) -> Option<&dyn ActivationFunction> {
        None
    }
}

/// Deterministic evaluator: `result = activation(linear_combination)`.
#[derive(Debug, Clone, Default)]
pub struct ActivationEvaluator<A> {
    activation: A,
}

impl<A: ActivationFunction> ActivationEvaluator<A> {
    /// Evaluator applying `activation`.
    #[must_use]
    pub const fn new(activation: A) -> Self {
        Self { activation }
    }

    /// The wrapped activation.
    #[must_use]
    pub fn activation(&self) -> &A {
        &self.activation
    }
}

impl<A: ActivationFunction> ForwardEvaluator for ActivationEvaluator<A> {
    fn process(&mut self, state: &mut StateView<'_>) {
        let activation = &self.activation;
        propagate(state, |x| activation.value(x));
    }

    fn check_validity(&self) -> Result<(), GenerationError> {
        self.activation.check_validity()
    }

    fn differentiable_activation(&self) -> Option<&dyn ActivationFunction> {
        Some(&self.activation)
    }
}

/// Stochastic evaluator: a neuron fires (`1`) when its activation value
/// exceeds a fresh uniform draw, otherwise outputs `0`.
///
/// Results are not differentiable, so this evaluator can not be trained by
/// backpropagation.
#[derive(Debug, Clone)]
pub struct StochasticEvaluator<A, R> {
    activation: A,
    rng: R,
}

impl<A: ActivationFunction, R: RngCore + Send> StochasticEvaluator<A, R> {
    /// Evaluator drawing from its own generator `rng`.
    #[must_use]
    pub const fn new(activation: A, rng: R) -> Self {
        Self { activation, rng }
    }
}

impl<A: ActivationFunction, R: RngCore + Send> ForwardEvaluator for StochasticEvaluator<A, R> {
    fn process(&mut self, state: &mut StateView<'_>) {
        let activation = &self.activation;
        let rng = &mut self.rng;
        propagate(state, |x| {
            if activation.value(x) > rng.random::<f64>() {
                1.0
            } else {
                0.0
            }
        });
    }

    fn check_validity(&self) -> Result<(), GenerationError> {
        self.activation.check_validity()
    }
}

/// Walk the evaluation order once, applying `activate` to each neuron's
/// linear combination.
pub fn propagate(state: &mut StateView<'_>, mut activate: impl FnMut(f64) -> f64) {
    let topology = state.topology;
    for &neuron in topology.evaluation_order() {
        let mut sum = state.bias[neuron];
        for (&parent, &weight) in topology.parents(neuron).iter().zip(&state.weight[neuron]) {
            sum += weight * state.result[parent];
        }
        state.linear_combination[neuron] = sum;
        state.result[neuron] = activate(sum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Sigmoid;
    use crate::topology::{invert, Topology};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// 0, 1 -> 2 -> 3
    fn chain_topology() -> Topology {
        let children = vec![vec![2], vec![2], vec![3], vec![]];
        let parents = invert(&children);
        Topology::from_parts(2, 3, children, parents, vec![2, 3]).unwrap()
    }

    struct Arrays {
        weight: Vec<Vec<f64>>,
        bias: Vec<f64>,
        linear_combination: Vec<f64>,
        result: Vec<f64>,
    }

    impl Arrays {
        fn new(input: [f64; 2]) -> Self {
            Self {
                weight: vec![vec![], vec![], vec![0.5, -1.0], vec![2.0]],
                bias: vec![0.0, 0.0, 0.25, -1.0],
                linear_combination: vec![0.0; 4],
                result: vec![input[0], input[1], 0.0, 0.0],
            }
        }

        fn view<'a>(&'a mut self, topology: &'a Topology) -> StateView<'a> {
            StateView::new(
                1.0,
                topology,
                &mut self.weight,
                &mut self.bias,
                &mut self.linear_combination,
                &mut self.result,
            )
        }
    }

    #[test]
    fn test_activation_evaluator_forward_pass() {
        let topology = chain_topology();
        let mut arrays = Arrays::new([1.0, 0.5]);
        let mut evaluator = ActivationEvaluator::new(Sigmoid::default());
        evaluator.process(&mut arrays.view(&topology));

        let s = Sigmoid::default();
        let lc2 = 0.25 + 0.5 * 1.0 - 1.0 * 0.5;
        let r2 = s.value(lc2);
        let lc3 = -1.0 + 2.0 * r2;
        assert_relative_eq!(arrays.linear_combination[2], lc2);
        assert_relative_eq!(arrays.result[2], r2);
        assert_relative_eq!(arrays.linear_combination[3], lc3);
        assert_relative_eq!(arrays.result[3], s.value(lc3));
        // inputs untouched
        assert_eq!(&arrays.result[..2], &[1.0, 0.5]);
    }

    #[test]
    fn test_activation_evaluator_is_differentiable() {
        let evaluator = ActivationEvaluator::new(Sigmoid::new(2.0));
        let activation = evaluator.differentiable_activation().unwrap();
        assert_relative_eq!(activation.derivative(0.0, 0.5), 0.5);
    }

    #[test]
    fn test_stochastic_evaluator_outputs_binary() {
        let topology = chain_topology();
        let mut evaluator =
            StochasticEvaluator::new(Sigmoid::default(), ChaCha8Rng::seed_from_u64(42));
        assert!(evaluator.differentiable_activation().is_none());

        for _ in 0..20 {
            let mut arrays = Arrays::new([0.2, 0.9]);
            evaluator.process(&mut arrays.view(&topology));
            for &r in &arrays.result[2..] {
                assert!(r == 0.0 || r == 1.0);
            }
        }
    }

    #[test]
    fn test_stochastic_evaluator_saturated_neuron_always_fires() {
        let topology = chain_topology();
        let mut evaluator =
            StochasticEvaluator::new(Sigmoid::new(100.0), ChaCha8Rng::seed_from_u64(1));
        let mut arrays = Arrays::new([1.0, 0.0]);
        arrays.bias[2] = 10.0;
        evaluator.process(&mut arrays.view(&topology));
        assert_eq!(arrays.result[2], 1.0);
    }

    #[test]
    fn test_evaluator_validity_delegates_to_activation() {
        assert!(ActivationEvaluator::new(Sigmoid::new(-1.0))
            .check_validity()
            .is_err());
        assert!(
            StochasticEvaluator::new(Sigmoid::default(), ChaCha8Rng::seed_from_u64(0))
                .check_validity()
                .is_ok()
        );
    }
}
