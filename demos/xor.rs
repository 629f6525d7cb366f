//! XOR example trained by backpropagation.
//!
//! This example builds a three layer perceptron from a named generator and
//! trains it on the XOR truth table, a classic problem a single layer of
//! neurons can not solve.
//!
//! Run with: `cargo run --example xor`

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_net::{
    ActivationEvaluator, Backpropagation, NetworkSettings, NeuralNetwork, QuadraticError,
    Sigmoid, TopologyGenerator,
};

const CASES: [([f64; 2], f64); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

/// Summed quadratic error over the truth table.
fn table_error(network: &NeuralNetwork) -> f64 {
    CASES
        .iter()
        .map(|(input, expected)| {
            let output = network.evaluate(input).unwrap()[0];
            0.5 * (output - expected).powi(2)
        })
        .sum()
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("XOR Backpropagation Example");
    println!("===========================\n");

    let epochs = 20_000;
    let learning_rate = 0.5;
    let seed = 42;

    let settings = NetworkSettings::new(2, 1, 1.0, TopologyGenerator::WideThreeLayer);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let network = NeuralNetwork::new(
        &settings,
        ActivationEvaluator::new(Sigmoid::default()),
        Backpropagation::with_learning_rate(QuadraticError, learning_rate).unwrap(),
        &mut rng,
    )
    .unwrap();

    println!("{}", network.topology());
    println!("Epochs: {}", epochs);
    println!("Learning rate: {}", learning_rate);
    println!();

    for epoch in 0..epochs {
        for (input, expected) in &CASES {
            network.learn(input, &[*expected]).unwrap();
        }

        if epoch % 2_000 == 0 || epoch == epochs - 1 {
            println!("Epoch {:5}: error={:.6}", epoch, table_error(&network));
        }
    }

    println!("\nTrained XOR outputs:");
    for (input, expected) in &CASES {
        let output = network.evaluate(input).unwrap()[0];
        let rounded = if output > 0.5 { 1.0 } else { 0.0 };
        let status = if (rounded - expected).abs() < 0.1 {
            "✓"
        } else {
            "✗"
        };
        println!(
            "  {} XOR {} = {:.4} (expected {}) {}",
            input[0] as i32, input[1] as i32, output, *expected as i32, status
        );
    }

    let state = network.snapshot();
    println!(
        "\nSnapshot: {} sources, {} weights",
        state.total_sources(),
        state.weight.iter().map(Vec::len).sum::<usize>()
    );
}
