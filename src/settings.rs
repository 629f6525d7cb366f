//! Construction-time configuration of a network.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::error::GenerationError;
use crate::layer::{Layer, LayerBlueprint};
use crate::topology::Topology;

/// Input amplitude must be strictly greater than this, otherwise the initial
/// biases (drawn from `[amplitude/4, 3·amplitude/4]`) would be too narrow.
pub const MINIMAL_INPUT_AMPLITUDE: f64 = 0.5;

/// Amplitude is finite and above [`MINIMAL_INPUT_AMPLITUDE`].
pub(crate) fn check_amplitude(amplitude: f64) -> Result<(), GenerationError> {
    if amplitude > MINIMAL_INPUT_AMPLITUDE && amplitude.is_finite() {
        Ok(())
    } else {
        Err(GenerationError::AmplitudeTooSmall {
            amplitude,
            minimum: MINIMAL_INPUT_AMPLITUDE,
        })
    }
}

/// Named topology families expanded from the input and output sizes.
///
/// Every generated layer uses [`Distribution::Localized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TopologyGenerator {
    /// Input fully connected to the surface.
    SingleLayer,
    /// One hidden layer as wide as the input, full interconnection.
    TwoLayer,
    /// One hidden layer of `(in + out) / 2` neurons, full interconnection.
    #[default]
    ThreeLayer,
    /// One hidden layer of `in + out` neurons, full interconnection.
    WideThreeLayer,
    /// Layer sizes halve from the input down to the output, full
    /// interconnection.
    Pyramidal,
    /// Pyramidal sizes, each neuron connected to about half of the next layer
    /// through a contiguous run of children.
    PyramidalLocalized,
}

impl TopologyGenerator {
    /// All generator families.
    pub const ALL: [Self; 6] = [
        Self::SingleLayer,
        Self::TwoLayer,
        Self::ThreeLayer,
        Self::WideThreeLayer,
        Self::Pyramidal,
        Self::PyramidalLocalized,
    ];

    /// Human readable summary.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::SingleLayer => "single layer of neurons fully connected to the input vector",
            Self::TwoLayer => "two layers of neurons, the first as wide as the input vector",
            Self::ThreeLayer => "one hidden layer sized as the average of input and output",
            Self::WideThreeLayer => "one hidden layer sized as the sum of input and output",
            Self::Pyramidal => "layer sizes halve towards the surface, full interconnection",
            Self::PyramidalLocalized => {
                "layer sizes halve towards the surface, each neuron feeds half of the next layer"
            }
        }
    }

    /// Expand into a blueprint for the given vector sizes.
    ///
    /// # Errors
    ///
    /// [`GenerationError::ZeroVectorSize`] when a size is zero.
    pub fn blueprint(self, input: usize, output: usize) -> Result<LayerBlueprint, GenerationError> {
        if input == 0 {
            return Err(GenerationError::ZeroVectorSize { which: "input" });
        }
        if output == 0 {
            return Err(GenerationError::ZeroVectorSize { which: "output" });
        }
        match self {
            Self::SingleLayer => full_interconnection(&[input, output]),
            Self::TwoLayer => full_interconnection(&[input, input, output]),
            Self::ThreeLayer => full_interconnection(&[input, ((input + output) / 2).max(1), output]),
            Self::WideThreeLayer => full_interconnection(&[input, input + output, output]),
            Self::Pyramidal => full_interconnection(&pyramid(input, output)),
            Self::PyramidalLocalized => {
                let sizes = pyramid(input, output);
                chain(&sizes, |parent, child| {
                    let half = child / 2;
                    if half * parent >= child {
                        half
                    } else {
                        child.div_ceil(parent)
                    }
                })
            }
        }
    }
}

/// Input size first, then halved while still wider than the output, then the
/// output size.
fn pyramid(input: usize, output: usize) -> Vec<usize> {
    let mut sizes = vec![input];
    let mut current = input / 2;
    while current > output {
        sizes.push(current);
        current /= 2;
    }
    sizes.push(output);
    sizes
}

fn full_interconnection(sizes: &[usize]) -> Result<LayerBlueprint, GenerationError> {
    chain(sizes, |_, child| child)
}

/// Blueprint of `sizes`, fan-out of each layer computed from its own and the
/// next layer's size.
fn chain(
    sizes: &[usize],
    fan_out: impl Fn(usize, usize) -> usize,
) -> Result<LayerBlueprint, GenerationError> {
    let mut blueprint = LayerBlueprint::new();
    for (idx, pair) in sizes.windows(2).enumerate() {
        let fan = fan_out(pair[0], pair[1]);
        let layer = if idx == 0 {
            Layer::input(pair[0], fan, Distribution::Localized)
        } else {
            Layer::ordinary(pair[0], fan, Distribution::Localized)
        };
        blueprint.add_layer(layer)?;
    }
    if let Some(&last) = sizes.last() {
        blueprint.add_layer(Layer::surface(last))?;
    }
    Ok(blueprint)
}

/// Where the network's topology comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopologySource {
    /// Already assembled topology, used as is.
    Preset(Topology),
    /// Blueprint assembled at construction.
    Blueprint(LayerBlueprint),
    /// Named family expanded from the vector sizes.
    Generator(TopologyGenerator),
}

/// Configuration for network construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Number of input coordinates.
    pub input_size: usize,
    /// Number of output components.
    pub output_size: usize,
    /// Upper bound of every input coordinate. Must exceed
    /// [`MINIMAL_INPUT_AMPLITUDE`].
    pub input_amplitude: f64,
    /// Topology source.
    pub topology: TopologySource,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            input_size: 2,
            output_size: 1,
            input_amplitude: 1.0,
            topology: TopologySource::Generator(TopologyGenerator::default()),
        }
    }
}

impl NetworkSettings {
    /// Settings using a named generator.
    #[must_use]
    pub fn new(
        input_size: usize,
        output_size: usize,
        input_amplitude: f64,
        generator: TopologyGenerator,
    ) -> Self {
        Self {
            input_size,
            output_size,
            input_amplitude,
            topology: TopologySource::Generator(generator),
        }
    }

    /// Settings using a custom blueprint. Sizes are taken from its first and
    /// last layers.
    #[must_use]
    pub fn from_blueprint(input_amplitude: f64, blueprint: LayerBlueprint) -> Self {
        let layers = blueprint.layers();
        let input_size = layers.first().map_or(0, |l| l.neurons);
        let output_size = if layers.len() > 1 {
            layers.last().map_or(0, |l| l.neurons)
        } else {
            0
        };
        Self {
            input_size,
            output_size,
            input_amplitude,
            topology: TopologySource::Blueprint(blueprint),
        }
    }

    /// Settings using a preset topology. Sizes are taken from it.
    #[must_use]
    pub fn from_topology(input_amplitude: f64, topology: Topology) -> Self {
        Self {
            input_size: topology.input_size(),
            output_size: topology.output_size(),
            input_amplitude,
            topology: TopologySource::Preset(topology),
        }
    }

    /// Check amplitude and vector sizes.
    ///
    /// # Errors
    ///
    /// [`GenerationError::AmplitudeTooSmall`] or [`GenerationError::ZeroVectorSize`].
    pub fn validate(&self) -> Result<(), GenerationError> {
        check_amplitude(self.input_amplitude)?;
        if self.input_size == 0 {
            return Err(GenerationError::ZeroVectorSize { which: "input" });
        }
        if self.output_size == 0 {
            return Err(GenerationError::ZeroVectorSize { which: "output" });
        }
        Ok(())
    }

    /// Validate the settings and produce the topology they describe.
    ///
    /// # Errors
    ///
    /// Any validation or generation failure, or
    /// [`GenerationError::SizeMismatch`] if the topology disagrees with the
    /// declared vector sizes.
    pub fn build_topology(&self, rng: &mut dyn RngCore) -> Result<Topology, GenerationError> {
        self.validate()?;
        let topology = match &self.topology {
            TopologySource::Preset(topology) => topology.clone(),
            TopologySource::Blueprint(blueprint) => Topology::generate(blueprint, rng)?,
            TopologySource::Generator(generator) => {
                let blueprint = generator.blueprint(self.input_size, self.output_size)?;
                Topology::generate(&blueprint, rng)?
            }
        };
        self.check_sizes(&topology)?;
        Ok(topology)
    }

    /// Declared sizes match `topology`.
    ///
    /// # Errors
    ///
    /// [`GenerationError::SizeMismatch`].
    pub fn check_sizes(&self, topology: &Topology) -> Result<(), GenerationError> {
        for (which, settings, actual) in [
            ("input", self.input_size, topology.input_size()),
            ("output", self.output_size, topology.output_size()),
        ] {
            if settings != actual {
                return Err(GenerationError::SizeMismatch {
                    which,
                    settings,
                    topology: actual,
                });
            }
        }
        Ok(())
    }
}
