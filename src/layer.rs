//! Layer descriptions and the incrementally validated layer blueprint.

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::error::GenerationError;

/// Role of a layer within the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerRole {
    /// Coordinates of the input vector. No activation, no parents.
    Input,
    /// Hidden neurons.
    Ordinary,
    /// Neurons whose results form the output vector.
    Surface,
}

/// Abstract description of one layer to be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Number of neurons (input coordinates for the input layer).
    pub neurons: usize,
    /// Number of children every neuron of this layer gets in the next layer.
    pub fan_out: usize,
    /// How child edges towards the next layer are spread.
    pub distribution: Distribution,
    /// Role of the layer.
    pub role: LayerRole,
}

impl Layer {
    /// Describe a layer.
    #[must_use]
    pub const fn new(
        neurons: usize,
        fan_out: usize,
        distribution: Distribution,
        role: LayerRole,
    ) -> Self {
        Self {
            neurons,
            fan_out,
            distribution,
            role,
        }
    }

    /// Input vector layer.
    #[must_use]
    pub const fn input(neurons: usize, fan_out: usize, distribution: Distribution) -> Self {
        Self::new(neurons, fan_out, distribution, LayerRole::Input)
    }

    /// Hidden layer.
    #[must_use]
    pub const fn ordinary(neurons: usize, fan_out: usize, distribution: Distribution) -> Self {
        Self::new(neurons, fan_out, distribution, LayerRole::Ordinary)
    }

    /// Surface layer. Its fan-out is never used, so it is fixed at 1.
    #[must_use]
    pub const fn surface(neurons: usize) -> Self {
        Self::new(neurons, 1, Distribution::Localized, LayerRole::Surface)
    }
}

/// Ordered list of layers, validated one append at a time.
///
/// Once handed to [`Topology::generate`](crate::Topology::generate) it is only
/// read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct LayerBlueprint {
    layers: Vec<Layer>,
}

impl LayerBlueprint {
    /// Empty blueprint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer.
    ///
    /// Rules are checked in this order: the first layer must be an input
    /// layer, only one input layer is allowed, nothing may follow a surface
    /// layer, fan-out and neuron count must be positive, and the previous
    /// layer's fan-out must not exceed this layer's neuron count.
    ///
    /// # Errors
    ///
    /// Returns the [`GenerationError`] naming the first violated rule. The
    /// blueprint is unchanged on failure.
    pub fn add_layer(&mut self, layer: Layer) -> Result<(), GenerationError> {
        let position = self.layers.len();
        let previous = self.layers.last();

        match previous {
            None if layer.role != LayerRole::Input => {
                return Err(GenerationError::FirstLayerNotInput);
            }
            Some(_) if layer.role == LayerRole::Input => {
                return Err(GenerationError::DuplicateInputLayer { layer: position });
            }
            Some(prev) if prev.role == LayerRole::Surface => {
                return Err(GenerationError::LayerAfterSurface { layer: position });
            }
            _ => {}
        }
        if layer.fan_out == 0 {
            return Err(GenerationError::ZeroFanOut { layer: position });
        }
        if layer.neurons == 0 {
            return Err(GenerationError::ZeroNeurons { layer: position });
        }
        if let Some(prev) = previous {
            if prev.fan_out > layer.neurons {
                return Err(GenerationError::FanOutExceedsNextLayer {
                    layer: position,
                    fan_out: prev.fan_out,
                    neurons: layer.neurons,
                });
            }
        }

        self.layers.push(layer);
        Ok(())
    }

    /// Builder-style [`add_layer`](Self::add_layer).
    ///
    /// # Errors
    ///
    /// Same as [`add_layer`](Self::add_layer).
    pub fn with_layer(mut self, layer: Layer) -> Result<Self, GenerationError> {
        self.add_layer(layer)?;
        Ok(self)
    }

    /// Layers in order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when no layer was added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl TryFrom<Vec<Layer>> for LayerBlueprint {
    type Error = GenerationError;

    fn try_from(layers: Vec<Layer>) -> Result<Self, Self::Error> {
        layers
            .into_iter()
            .try_fold(Self::new(), |blueprint, layer| blueprint.with_layer(layer))
    }
}

impl From<LayerBlueprint> for Vec<Layer> {
    fn from(blueprint: LayerBlueprint) -> Self {
        blueprint.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localized_input(neurons: usize, fan_out: usize) -> Layer {
        Layer::input(neurons, fan_out, Distribution::Localized)
    }

    #[test]
    fn test_valid_blueprint() {
        let blueprint = LayerBlueprint::new()
            .with_layer(localized_input(4, 3))
            .and_then(|b| b.with_layer(Layer::ordinary(3, 2, Distribution::Disperse)))
            .and_then(|b| b.with_layer(Layer::surface(2)))
            .unwrap();

        assert_eq!(blueprint.len(), 3);
        assert_eq!(blueprint.layers()[0].role, LayerRole::Input);
        assert_eq!(blueprint.layers()[2].role, LayerRole::Surface);
    }

    #[test]
    fn test_first_layer_must_be_input() {
        let mut blueprint = LayerBlueprint::new();
        let err = blueprint.add_layer(Layer::surface(2)).unwrap_err();
        assert_eq!(err, GenerationError::FirstLayerNotInput);
        assert!(blueprint.is_empty());
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let mut blueprint = LayerBlueprint::new();
        blueprint.add_layer(localized_input(2, 1)).unwrap();
        let err = blueprint.add_layer(localized_input(2, 1)).unwrap_err();
        assert_eq!(err, GenerationError::DuplicateInputLayer { layer: 1 });
        assert_eq!(blueprint.len(), 1);
    }

    #[test]
    fn test_nothing_after_surface() {
        let mut blueprint = LayerBlueprint::new();
        blueprint.add_layer(localized_input(2, 1)).unwrap();
        blueprint.add_layer(Layer::surface(1)).unwrap();
        let err = blueprint
            .add_layer(Layer::ordinary(1, 1, Distribution::Localized))
            .unwrap_err();
        assert_eq!(err, GenerationError::LayerAfterSurface { layer: 2 });
    }

    #[test]
    fn test_zero_counts_rejected() {
        let mut blueprint = LayerBlueprint::new();
        assert_eq!(
            blueprint.add_layer(localized_input(2, 0)).unwrap_err(),
            GenerationError::ZeroFanOut { layer: 0 }
        );
        assert_eq!(
            blueprint.add_layer(localized_input(0, 1)).unwrap_err(),
            GenerationError::ZeroNeurons { layer: 0 }
        );
    }

    #[test]
    fn test_fan_out_checked_against_next_layer() {
        let mut blueprint = LayerBlueprint::new();
        blueprint.add_layer(localized_input(2, 3)).unwrap();
        let err = blueprint.add_layer(Layer::surface(2)).unwrap_err();
        assert_eq!(
            err,
            GenerationError::FanOutExceedsNextLayer {
                layer: 1,
                fan_out: 3,
                neurons: 2
            }
        );
        assert_eq!(blueprint.len(), 1);
    }

    #[test]
    fn test_deserialization_revalidates() {
        let bad = vec![Layer::surface(1)];
        let json = serde_json::to_string(&bad).unwrap();
        assert!(serde_json::from_str::<LayerBlueprint>(&json).is_err());

        let good = vec![localized_input(2, 1), Layer::surface(1)];
        let json = serde_json::to_string(&good).unwrap();
        let blueprint: LayerBlueprint = serde_json::from_str(&json).unwrap();
        assert_eq!(blueprint.layers(), good.as_slice());
    }
}
