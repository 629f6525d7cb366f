//! The network engine: owns the live state and its policies.
//!
//! Every public operation runs inside one critical section per network, so a
//! [`NeuralNetwork`] can be shared between threads while evaluation and
//! training of one instance never overlap.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{Rng, RngCore};
use tracing::info;

use crate::error::{GenerationError, RuntimeError};
use crate::evaluator::ForwardEvaluator;
use crate::learning::{check_reference, Learner};
use crate::settings::{check_amplitude, NetworkSettings};
use crate::state::{NetworkState, StateView};
use crate::topology::Topology;

/// Initial weights are drawn from `[-INITIAL_WEIGHT_RANGE, INITIAL_WEIGHT_RANGE]`.
pub const INITIAL_WEIGHT_RANGE: f64 = 0.5;

/// Feed-forward network with pluggable forward and learning policies.
pub struct NeuralNetwork {
    inner: Mutex<Engine>,
}

struct Engine {
    topology: Arc<Topology>,
    input_amplitude: f64,
    weight: Vec<Vec<f64>>,
    bias: Vec<f64>,
    linear_combination: Vec<f64>,
    result: Vec<f64>,
    evaluator: Box<dyn ForwardEvaluator>,
    learner: Box<dyn Learner>,
}

impl Engine {
    fn check_input(&self, input: &[f64]) -> Result<(), RuntimeError> {
        let expected = self.topology.input_size();
        if input.len() != expected {
            return Err(RuntimeError::InputCardinality {
                expected,
                actual: input.len(),
            });
        }
        let amplitude = self.input_amplitude;
        match input
            .iter()
            .position(|value| !(0.0..=amplitude).contains(value))
        {
            Some(index) => Err(RuntimeError::InputOutOfRange {
                index,
                value: input[index],
                amplitude,
            }),
            None => Ok(()),
        }
    }

    /// Forward pass on an already validated input.
    fn forward(&mut self, input: &[f64]) {
        let Self {
            topology,
            input_amplitude,
            weight,
            bias,
            linear_combination,
            result,
            evaluator,
            ..
        } = self;
        result[..input.len()].copy_from_slice(input);
        let mut view = StateView::new(
            *input_amplitude,
            &**topology,
            weight,
            bias,
            linear_combination,
            result,
        );
        evaluator.process(&mut view);
    }

    fn learn_step(&mut self, reference: &[f64]) -> Result<(), RuntimeError> {
        let Self {
            topology,
            input_amplitude,
            weight,
            bias,
            linear_combination,
            result,
            evaluator,
            learner,
        } = self;
        let mut view = StateView::new(
            *input_amplitude,
            &**topology,
            weight,
            bias,
            linear_combination,
            result,
        );
        learner.process(&mut view, reference, &**evaluator)
    }

    fn output(&self) -> &[f64] {
        &self.result[self.topology.first_surface()..]
    }
}

impl NeuralNetwork {
    /// Build a network from settings with freshly randomized weights and
    /// biases.
    ///
    /// Biases are drawn from `[amplitude/4, 3·amplitude/4]`, weights from
    /// `[-0.5, 0.5]`.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`] from policy validation, settings validation or
    /// topology generation.
    pub fn new<F, L>(
        settings: &NetworkSettings,
        evaluator: F,
        learner: L,
        rng: &mut dyn RngCore,
    ) -> Result<Self, GenerationError>
    where
        F: ForwardEvaluator + 'static,
        L: Learner + 'static,
    {
        evaluator.check_validity()?;
        learner.check_validity()?;
        let topology = settings.build_topology(rng)?;

        let amplitude = settings.input_amplitude;
        let total = topology.total_sources();
        let bias: Vec<f64> = (0..total)
            .map(|_| rng.random_range(amplitude / 4.0..=amplitude * 3.0 / 4.0))
            .collect();
        let weight: Vec<Vec<f64>> = (0..total)
            .map(|source| {
                topology
                    .parents(source)
                    .iter()
                    .map(|_| rng.random_range(-INITIAL_WEIGHT_RANGE..=INITIAL_WEIGHT_RANGE))
                    .collect()
            })
            .collect();

        info!(
            inputs = topology.input_size(),
            outputs = topology.output_size(),
            sources = total,
            edges = weight.iter().map(Vec::len).sum::<usize>(),
            "constructed neural network"
        );

        Ok(Self {
            inner: Mutex::new(Engine {
                topology: Arc::new(topology),
                input_amplitude: amplitude,
                weight,
                bias,
                linear_combination: vec![0.0; total],
                result: vec![0.0; total],
                evaluator: Box::new(evaluator),
                learner: Box::new(learner),
            }),
        })
    }

    /// Resume a network from a snapshot.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`] from policy validation, or if the snapshot's
    /// topology, arrays or amplitude are invalid.
    pub fn from_state<F, L>(
        state: NetworkState,
        evaluator: F,
        learner: L,
    ) -> Result<Self, GenerationError>
    where
        F: ForwardEvaluator + 'static,
        L: Learner + 'static,
    {
        evaluator.check_validity()?;
        learner.check_validity()?;
        check_amplitude(state.input_amplitude)?;
        let topology = state.topology()?;

        info!(
            inputs = topology.input_size(),
            outputs = topology.output_size(),
            sources = topology.total_sources(),
            "restored neural network from snapshot"
        );

        Ok(Self {
            inner: Mutex::new(Engine {
                topology: Arc::new(topology),
                input_amplitude: state.input_amplitude,
                weight: state.weight,
                bias: state.bias,
                linear_combination: state.linear_combination,
                result: state.result,
                evaluator: Box::new(evaluator),
                learner: Box::new(learner),
            }),
        })
    }

    /// Map `input` to the output vector.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InputCardinality`] or [`RuntimeError::InputOutOfRange`];
    /// the state is unchanged.
    pub fn evaluate(&self, input: &[f64]) -> Result<Vec<f64>, RuntimeError> {
        let mut engine = self.inner.lock();
        engine.check_input(input)?;
        engine.forward(input);
        Ok(engine.output().to_vec())
    }

    /// Evaluate `input`, then learn towards `reference`.
    ///
    /// Returns the output computed before the update.
    ///
    /// # Errors
    ///
    /// Any input, reference or policy mismatch; every check runs before the
    /// forward pass, so the state is unchanged on failure.
    pub fn learn(&self, input: &[f64], reference: &[f64]) -> Result<Vec<f64>, RuntimeError> {
        let mut engine = self.inner.lock();
        engine.check_input(input)?;
        engine.learner.check_request(
            reference,
            engine.topology.output_size(),
            engine.evaluator.as_ref(),
        )?;
        engine.forward(input);
        let output = engine.output().to_vec();
        engine.learn_step(reference)?;
        Ok(output)
    }

    /// Learn towards `reference` from the state left by the last forward
    /// pass.
    ///
    /// # Errors
    ///
    /// Any reference or policy mismatch; the state is unchanged.
    pub fn train(&self, reference: &[f64]) -> Result<(), RuntimeError> {
        self.inner.lock().learn_step(reference)
    }

    /// Scalar error of the last output against `reference`, as measured by
    /// the learner.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ReferenceCardinality`] or
    /// [`RuntimeError::ReferenceOutOfRange`].
    pub fn error_value(&self, reference: &[f64]) -> Result<f64, RuntimeError> {
        let engine = self.inner.lock();
        check_reference(reference, engine.topology.output_size())?;
        Ok(engine.learner.error_value(engine.output(), reference))
    }

    /// Owned deep copy of the live state.
    #[must_use]
    pub fn snapshot(&self) -> NetworkState {
        let engine = self.inner.lock();
        let topology = engine.topology.as_ref();
        NetworkState {
            input_amplitude: engine.input_amplitude,
            input_size: topology.input_size(),
            output_size: topology.output_size(),
            weight: engine.weight.clone(),
            bias: engine.bias.clone(),
            linear_combination: engine.linear_combination.clone(),
            result: engine.result.clone(),
            children: topology.all_children().to_vec(),
            parents: topology.all_parents().to_vec(),
            evaluation_order: topology.evaluation_order().to_vec(),
        }
    }

    /// Replace the live numeric state with `state`.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InconsistentState`] if the snapshot describes a
    /// different graph than this network's, or any error from validating the
    /// snapshot itself. The network is unchanged on failure.
    pub fn restore(&self, state: NetworkState) -> Result<(), GenerationError> {
        check_amplitude(state.input_amplitude)?;
        let topology = state.topology()?;

        let mut engine = self.inner.lock();
        let current = engine.topology.as_ref();
        if topology.input_size() != current.input_size()
            || topology.all_children() != current.all_children()
            || topology.evaluation_order() != current.evaluation_order()
        {
            return Err(GenerationError::InconsistentState(
                "snapshot topology differs from the network topology".to_string(),
            ));
        }

        engine.input_amplitude = state.input_amplitude;
        engine.weight = state.weight;
        engine.bias = state.bias;
        engine.linear_combination = state.linear_combination;
        engine.result = state.result;
        info!(sources = topology.total_sources(), "restored network state");
        Ok(())
    }

    /// Shared read-only topology.
    #[must_use]
    pub fn topology(&self) -> Arc<Topology> {
        Arc::clone(&self.inner.lock().topology)
    }

    /// Input vector size.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.inner.lock().topology.input_size()
    }

    /// Output vector size.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.inner.lock().topology.output_size()
    }

    /// Upper bound of input coordinates.
    #[must_use]
    pub fn input_amplitude(&self) -> f64 {
        self.inner.lock().input_amplitude
    }
}

impl fmt::Debug for NeuralNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.inner.lock();
        f.debug_struct("NeuralNetwork")
            .field("input_size", &engine.topology.input_size())
            .field("output_size", &engine.topology.output_size())
            .field("sources", &engine.topology.total_sources())
            .field("input_amplitude", &engine.input_amplitude)
            .finish_non_exhaustive()
    }
}
