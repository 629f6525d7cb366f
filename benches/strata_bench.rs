//! Benchmarks for strata-net.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_net::{
    ActivationEvaluator, Backpropagation, Distribution, NetworkSettings, NeuralNetwork,
    QuadraticError, Sigmoid, Topology, TopologyGenerator,
};

fn network(generator: TopologyGenerator, input: usize, output: usize) -> NeuralNetwork {
    let settings = NetworkSettings::new(input, output, 1.0, generator);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    NeuralNetwork::new(
        &settings,
        ActivationEvaluator::new(Sigmoid::default()),
        Backpropagation::new(QuadraticError),
        &mut rng,
    )
    .unwrap()
}

fn bench_distribution(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for distribution in Distribution::ALL {
        let name = format!("distribute_{distribution:?}_64x128_k16").to_lowercase();
        c.bench_function(&name, |b| {
            b.iter(|| {
                black_box(
                    distribution
                        .generate_connections(64, 64, 191, 16, &mut rng)
                        .unwrap(),
                );
            });
        });
    }
}

fn bench_topology_generation(c: &mut Criterion) {
    let blueprint = TopologyGenerator::Pyramidal.blueprint(256, 4).unwrap();

    c.bench_function("topology_pyramidal_256x4", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        b.iter(|| {
            black_box(Topology::generate(&blueprint, &mut rng).unwrap());
        });
    });
}

fn bench_forward(c: &mut Criterion) {
    let net = network(TopologyGenerator::WideThreeLayer, 32, 8);
    let input: Vec<f64> = (0..32u32).map(|i| f64::from(i) / 32.0).collect();

    c.bench_function("evaluate_wide_three_layer_32x8", |b| {
        b.iter(|| {
            black_box(net.evaluate(&input).unwrap());
        });
    });
}

fn bench_training_step(c: &mut Criterion) {
    let net = network(TopologyGenerator::WideThreeLayer, 32, 8);
    let input: Vec<f64> = (0..32u32).map(|i| f64::from(i) / 32.0).collect();
    let reference = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

    c.bench_function("learn_wide_three_layer_32x8", |b| {
        b.iter(|| {
            black_box(net.learn(&input, &reference).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_distribution,
    bench_topology_generation,
    bench_forward,
    bench_training_step,
);
criterion_main!(benches);
