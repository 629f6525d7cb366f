//! Integration tests for strata-net.

use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_net::{
    ActivationEvaluator, ActivationFunction, Backpropagation, ConnectionDistributor, Distribution,
    GenerationError, Layer, LayerBlueprint, LayerRole, NetworkSettings, NetworkState,
    NeuralNetwork, QuadraticError, RuntimeError, Sigmoid, StochasticEvaluator, Topology,
    TopologyGenerator, DEFAULT_LEARNING_RATE,
};

fn test_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

fn blueprint(layers: &[Layer]) -> LayerBlueprint {
    layers
        .iter()
        .try_fold(LayerBlueprint::new(), |bp, &layer| bp.with_layer(layer))
        .unwrap()
}

fn sigmoid_network(settings: &NetworkSettings) -> NeuralNetwork {
    NeuralNetwork::new(
        settings,
        ActivationEvaluator::new(Sigmoid::default()),
        Backpropagation::new(QuadraticError),
        &mut test_rng(),
    )
    .unwrap()
}

/// Forward gaps between consecutive children of a sorted row on a circle of
/// `len` points.
fn circular_gaps(row: &[usize], first: usize, len: usize) -> Vec<usize> {
    let local: Vec<usize> = row.iter().map(|c| c - first).collect();
    (0..local.len())
        .map(|k| {
            let next = local[(k + 1) % local.len()];
            (next + len - local[k] - 1) % len + 1
        })
        .collect()
}

fn in_degrees(rows: &[Vec<usize>], first: usize, len: usize) -> Vec<usize> {
    let mut counts = vec![0; len];
    for &child in rows.iter().flatten() {
        counts[child - first] += 1;
    }
    counts
}

fn assert_consistent(topology: &Topology) {
    let total = topology.total_sources();
    for source in 0..total {
        let children = topology.children(source);
        let parents = topology.parents(source);
        assert!(children.windows(2).all(|w| w[0] < w[1]), "children of {source}");
        assert!(parents.windows(2).all(|w| w[0] < w[1]), "parents of {source}");
        for &child in children {
            assert!(topology.parents(child).contains(&source));
        }
        for &parent in parents {
            assert!(topology.children(parent).contains(&source));
        }
    }

    let mut position = vec![None; total];
    for (rank, &neuron) in topology.evaluation_order().iter().enumerate() {
        position[neuron] = Some(rank);
    }
    for neuron in topology.first_neuron()..total {
        let rank = position[neuron].expect("neuron missing from evaluation order");
        for &parent in topology.parents(neuron) {
            if parent >= topology.first_neuron() {
                assert!(position[parent].unwrap() < rank);
            }
        }
    }
}

#[test]
fn test_generated_topologies_are_consistent() {
    let shapes: [&[usize]; 4] = [&[3, 2], &[4, 6, 2], &[5, 7, 3, 2], &[8, 4, 8, 1]];
    for distribution in Distribution::ALL {
        for sizes in shapes {
            for seed in 0..5 {
                let mut layers = Vec::new();
                for (idx, pair) in sizes.windows(2).enumerate() {
                    let fan_out = pair[1].div_ceil(pair[0]).max(2).min(pair[1]);
                    layers.push(if idx == 0 {
                        Layer::input(pair[0], fan_out, distribution)
                    } else {
                        Layer::ordinary(pair[0], fan_out, distribution)
                    });
                }
                layers.push(Layer::surface(sizes[sizes.len() - 1]));

                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let topology = Topology::generate(&blueprint(&layers), &mut rng)
                    .unwrap_or_else(|e| panic!("{distribution:?} {sizes:?}: {e}"));
                assert_consistent(&topology);
                assert_eq!(topology.input_size(), sizes[0]);
                assert_eq!(topology.output_size(), sizes[sizes.len() - 1]);
            }
        }
    }
}

#[test]
fn test_generator_topologies_are_consistent() {
    let mut rng = test_rng();
    for generator in TopologyGenerator::ALL {
        let topology = NetworkSettings::new(12, 3, 1.0, generator)
            .build_topology(&mut rng)
            .unwrap();
        assert_consistent(&topology);
    }
}

#[test]
fn test_localized_four_to_eight() {
    let rows = Distribution::Localized
        .generate_connections(4, 0, 7, 2, &mut test_rng())
        .unwrap();
    assert_eq!(rows.len(), 4);
    for row in &rows {
        assert_eq!(row.len(), 2);
        let gaps = circular_gaps(row, 0, 8);
        assert_eq!(gaps.iter().filter(|&&g| g != 1).count(), 1, "{row:?}");
    }
    assert_eq!(in_degrees(&rows, 0, 8), vec![1; 8]);
}

#[test]
fn test_disperse_three_to_nine() {
    let rows = Distribution::Disperse
        .generate_connections(3, 20, 28, 3, &mut test_rng())
        .unwrap();
    assert_eq!(in_degrees(&rows, 20, 9), vec![1; 9]);
    for row in &rows {
        for gap in circular_gaps(row, 20, 9) {
            assert!(gap >= 3, "{row:?}");
        }
    }
}

#[test]
fn test_random_two_to_four_terminates() {
    let mut rng = test_rng();
    for _ in 0..500 {
        let rows = Distribution::Random
            .generate_connections(2, 0, 3, 2, &mut rng)
            .unwrap();
        let degrees = in_degrees(&rows, 0, 4);
        let min = degrees.iter().min().unwrap();
        let max = degrees.iter().max().unwrap();
        assert!(max - min <= 1);
        for row in &rows {
            assert_ne!(row[0], row[1]);
        }
    }
}

#[test]
fn test_wrong_length_input_leaves_state_unchanged() {
    let network = sigmoid_network(&NetworkSettings::new(3, 2, 1.0, TopologyGenerator::ThreeLayer));
    network.evaluate(&[0.1, 0.2, 0.3]).unwrap();
    let before = network.snapshot();

    assert_eq!(
        network.evaluate(&[0.1, 0.2]).unwrap_err(),
        RuntimeError::InputCardinality {
            expected: 3,
            actual: 2
        }
    );
    assert!(network.learn(&[0.1, 0.2, 0.3, 0.4], &[0.0, 1.0]).is_err());
    assert!(network.learn(&[0.1, 0.2, 0.3], &[0.0]).is_err());
    assert_eq!(network.snapshot(), before);
}

#[test]
fn test_snapshot_restores_into_fresh_network() {
    let network = sigmoid_network(&NetworkSettings::new(4, 2, 1.0, TopologyGenerator::Pyramidal));
    for _ in 0..10 {
        network.learn(&[0.9, 0.1, 0.5, 0.0], &[1.0, 0.0]).unwrap();
    }
    let input = [0.3, 0.6, 0.2, 1.0];
    let expected = network.evaluate(&input).unwrap();

    let json = serde_json::to_string(&network.snapshot()).unwrap();
    let state: NetworkState = serde_json::from_str(&json).unwrap();
    let fresh = NeuralNetwork::from_state(
        state,
        ActivationEvaluator::new(Sigmoid::default()),
        Backpropagation::new(QuadraticError),
    )
    .unwrap();

    assert_eq!(fresh.evaluate(&input).unwrap(), expected);
    assert_eq!(fresh.snapshot(), network.snapshot());
}

#[test]
fn test_single_layer_bias_update_matches_hand_computation() {
    let settings = NetworkSettings::new(3, 1, 1.0, TopologyGenerator::SingleLayer);
    let network = sigmoid_network(&settings);
    let topology = network.topology();
    assert_eq!(topology.first_surface(), 3);
    assert_eq!(topology.parents(3), &[0, 1, 2]);

    let reference = [0.8];
    network.evaluate(&[0.5, 0.25, 1.0]).unwrap();
    let before = network.snapshot();
    network.train(&reference).unwrap();
    let after = network.snapshot();

    let sigmoid = Sigmoid::default();
    let result = before.result[3];
    let d_e_d_s =
        (result - reference[0]) * sigmoid.derivative(before.linear_combination[3], result);
    assert_relative_eq!(
        after.bias[3],
        before.bias[3] - DEFAULT_LEARNING_RATE * d_e_d_s,
        epsilon = 1e-12
    );
    for k in 0..3 {
        assert_relative_eq!(
            after.weight[3][k],
            before.weight[3][k] - DEFAULT_LEARNING_RATE * d_e_d_s * before.result[k],
            epsilon = 1e-12
        );
    }
    // Input biases never participate.
    assert_eq!(&after.bias[..3], &before.bias[..3]);
}

/// Wires hidden layers with fixed rows, ignoring the layer's distribution.
struct FixedDistributor {
    input_rows: Vec<Vec<usize>>,
    hidden_rows: Vec<Vec<usize>>,
}

impl ConnectionDistributor for FixedDistributor {
    fn distribute(
        &self,
        parent: &Layer,
        _first: usize,
        _last: usize,
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<usize>>, GenerationError> {
        Ok(match parent.role {
            LayerRole::Input => self.input_rows.clone(),
            _ => self.hidden_rows.clone(),
        })
    }
}

fn two_two_one() -> LayerBlueprint {
    blueprint(&[
        Layer::input(2, 1, Distribution::Localized),
        Layer::ordinary(2, 1, Distribution::Localized),
        Layer::surface(1),
    ])
}

#[test]
fn test_omitted_edge_trips_watchdog() {
    // Neuron 3 never gets a parent.
    let distributor = FixedDistributor {
        input_rows: vec![vec![2], vec![2]],
        hidden_rows: vec![vec![4], vec![4]],
    };
    let err = Topology::generate_with(&two_two_one(), &distributor, &mut test_rng()).unwrap_err();
    assert_eq!(
        err,
        GenerationError::NonConvergentOrder {
            sweeps: 7,
            ordered: 1,
            neurons: 3
        }
    );
    assert!(err.to_string().contains("disconnected or cyclic"));
}

#[test]
fn test_cycle_trips_watchdog() {
    // 2 -> 3 and 3 -> 2
    let distributor = FixedDistributor {
        input_rows: vec![vec![2], vec![3]],
        hidden_rows: vec![vec![3, 4], vec![2, 4]],
    };
    let err = Topology::generate_with(&two_two_one(), &distributor, &mut test_rng()).unwrap_err();
    assert_eq!(
        err,
        GenerationError::NonConvergentOrder {
            sweeps: 7,
            ordered: 0,
            neurons: 3
        }
    );
}

#[test]
fn test_distributor_row_count_checked() {
    let distributor = FixedDistributor {
        input_rows: vec![vec![2]],
        hidden_rows: vec![vec![4], vec![4]],
    };
    assert!(matches!(
        Topology::generate_with(&two_two_one(), &distributor, &mut test_rng()),
        Err(GenerationError::InconsistentTopology(_))
    ));
}

#[test]
fn test_distributor_cannot_wire_into_inputs() {
    // Neuron 3 points back at input coordinate 1.
    let distributor = FixedDistributor {
        input_rows: vec![vec![2, 3], vec![2]],
        hidden_rows: vec![vec![4], vec![1, 4]],
    };
    assert_eq!(
        Topology::generate_with(&two_two_one(), &distributor, &mut test_rng()).unwrap_err(),
        GenerationError::ChildOutOfRange {
            parent: 1,
            child: 1,
            first: 2,
            last: 4
        }
    );
}

#[test]
fn test_distributor_rows_are_sorted_and_deduplicated() {
    let duplicated = FixedDistributor {
        input_rows: vec![vec![3, 2, 3], vec![2]],
        hidden_rows: vec![vec![4], vec![4]],
    };
    assert_eq!(
        Topology::generate_with(&two_two_one(), &duplicated, &mut test_rng()).unwrap_err(),
        GenerationError::DuplicateEdge {
            parent: 0,
            child: 3
        }
    );

    let unsorted = FixedDistributor {
        input_rows: vec![vec![3, 2], vec![2]],
        hidden_rows: vec![vec![4], vec![4]],
    };
    let topology = Topology::generate_with(&two_two_one(), &unsorted, &mut test_rng()).unwrap();
    assert_eq!(topology.children(0), &[2, 3]);
    assert_consistent(&topology);

    let network = NeuralNetwork::new(
        &NetworkSettings::from_topology(1.0, topology),
        ActivationEvaluator::new(Sigmoid::default()),
        Backpropagation::new(QuadraticError),
        &mut test_rng(),
    )
    .unwrap();
    assert!(NeuralNetwork::from_state(
        network.snapshot(),
        ActivationEvaluator::new(Sigmoid::default()),
        Backpropagation::new(QuadraticError),
    )
    .is_ok());
}

#[test]
fn test_stochastic_evaluator_rejected_by_backpropagation() {
    let settings = NetworkSettings::new(2, 2, 1.0, TopologyGenerator::TwoLayer);
    let network = NeuralNetwork::new(
        &settings,
        StochasticEvaluator::new(Sigmoid::default(), ChaCha8Rng::seed_from_u64(11)),
        Backpropagation::new(QuadraticError),
        &mut test_rng(),
    )
    .unwrap();

    let output = network.evaluate(&[0.5, 0.5]).unwrap();
    assert!(output.iter().all(|&v| v == 0.0 || v == 1.0));

    let before = network.snapshot();
    assert_eq!(
        network.learn(&[0.5, 0.5], &[1.0, 0.0]).unwrap_err(),
        RuntimeError::NonDifferentiableEvaluator
    );
    assert_eq!(network.snapshot(), before);
}

#[test]
fn test_blueprint_settings_train_towards_reference() {
    let layers = [
        Layer::input(4, 3, Distribution::Disperse),
        Layer::ordinary(6, 2, Distribution::Random),
        Layer::surface(2),
    ];
    let network = sigmoid_network(&NetworkSettings::from_blueprint(1.0, blueprint(&layers)));
    let input = [0.2, 0.4, 0.6, 0.8];
    let reference = [1.0, 0.0];

    network.evaluate(&input).unwrap();
    let initial = network.error_value(&reference).unwrap();
    for _ in 0..300 {
        network.learn(&input, &reference).unwrap();
    }
    network.evaluate(&input).unwrap();
    assert!(network.error_value(&reference).unwrap() < initial);
}

#[test]
fn test_topology_display_lists_every_source() {
    let topology = NetworkSettings::new(3, 2, 1.0, TopologyGenerator::ThreeLayer)
        .build_topology(&mut test_rng())
        .unwrap();
    let table = topology.to_string();
    assert!(table.contains("IN"));
    assert!(table.contains("OUT"));
    assert_eq!(table.lines().count(), 5 + topology.total_sources());
}

#[test]
fn test_networks_shared_across_threads() {
    let network = Arc::new(sigmoid_network(&NetworkSettings::new(
        2,
        1,
        1.0,
        TopologyGenerator::WideThreeLayer,
    )));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let network = Arc::clone(&network);
            thread::spawn(move || {
                for i in 0..50 {
                    let x = if (t + i) % 2 == 0 { 0.0 } else { 1.0 };
                    network.learn(&[x, 1.0 - x], &[x]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let output = network.evaluate(&[1.0, 0.0]).unwrap();
    assert!(output[0].is_finite());
    assert_consistent(&network.topology());
}
