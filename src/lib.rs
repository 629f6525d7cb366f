//! # Strata Net
//!
//! Feed-forward neural networks whose connectivity is generated from a layer
//! blueprint, evaluated in a single pass and trained by backpropagation.
//!
//! ## Features
//!
//! - **Generated Topologies**: Layers are wired by one of three edge
//!   distribution strategies (localized, disperse, random), each checked for
//!   uniform fan-in and its own spacing invariant after generation
//! - **Safe Evaluation Order**: A watchdog-bounded relaxation derives an order in
//!   which every neuron follows its parents; cyclic or disconnected graphs are
//!   rejected at construction
//! - **Pluggable Policies**: Activation, error, forward evaluation and learning
//!   are traits with ready implementations (`Sigmoid`, `QuadraticError`,
//!   `PNorm`, `ActivationEvaluator`, `StochasticEvaluator`, `Backpropagation`)
//! - **Snapshots**: Owned `NetworkState` copies serialize with Serde and restore
//!   into a fresh or existing network
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_net::{
//!     ActivationEvaluator, Backpropagation, NetworkSettings, NeuralNetwork, QuadraticError,
//!     Sigmoid, TopologyGenerator,
//! };
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let settings = NetworkSettings::new(2, 1, 1.0, TopologyGenerator::ThreeLayer);
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let network = NeuralNetwork::new(
//!     &settings,
//!     ActivationEvaluator::new(Sigmoid::default()),
//!     Backpropagation::new(QuadraticError),
//!     &mut rng,
//! )
//! .unwrap();
//!
//! // Evaluate, then nudge the output towards 1.0
//! let output = network.learn(&[0.25, 0.75], &[1.0]).unwrap();
//! assert_eq!(output.len(), 1);
//! ```
//!
//! ## Custom Blueprints
//!
//! ```rust
//! use strata_net::{Distribution, Layer, LayerBlueprint, Topology};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let blueprint = LayerBlueprint::new()
//!     .with_layer(Layer::input(4, 3, Distribution::Disperse))
//!     .and_then(|bp| bp.with_layer(Layer::ordinary(6, 2, Distribution::Random)))
//!     .and_then(|bp| bp.with_layer(Layer::surface(2)))
//!     .unwrap();
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let topology = Topology::generate(&blueprint, &mut rng).unwrap();
//! assert_eq!(topology.total_sources(), 12);
//! println!("{topology}");
//! ```
//!
//! ## Architecture
//!
//! ### Source Indexing
//!
//! Input coordinates and neurons share one index space, split into three
//! contiguous ranges: inputs, hidden neurons, surface neurons. Weights are
//! stored per neuron, parallel to its sorted parent list.
//!
//! ### State Hand-off
//!
//! Policies receive a `StateView` borrowing the live arrays, only while the
//! network holds its lock. Everything leaving the network is an owned
//! `NetworkState`.

pub mod activation;
pub mod distribution;
pub mod error;
pub mod error_function;
pub mod evaluator;
pub mod layer;
pub mod learning;
pub mod network;
pub mod settings;
pub mod state;
pub mod topology;

// Re-exports for convenience
pub use activation::{ActivationFunction, Sigmoid};
pub use distribution::{Distribution, RANDOM_WINDOW_ATTEMPTS};
pub use error::{GenerationError, RuntimeError};
pub use error_function::{ErrorFunction, PNorm, QuadraticError};
pub use evaluator::{ActivationEvaluator, ForwardEvaluator, StochasticEvaluator};
pub use layer::{Layer, LayerBlueprint, LayerRole};
pub use learning::{Backpropagation, Learner, DEFAULT_LEARNING_RATE};
pub use network::NeuralNetwork;
pub use settings::{NetworkSettings, TopologyGenerator, TopologySource, MINIMAL_INPUT_AMPLITUDE};
pub use state::{NetworkState, StateView};
pub use topology::{ConnectionDistributor, LayerDistributor, Topology};
