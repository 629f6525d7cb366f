//! Numeric state of a network in its two hand-off forms.
//!
//! - [`StateView`] borrows the live arrays of a network. Policies receive it
//!   while the network holds its lock; writes through it change the network.
//! - [`NetworkState`] is an owned deep copy. It can be logged, serialized or
//!   restored into another network without any synchronization.

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::topology::Topology;

/// Owned snapshot of a network, sufficient to resume or inspect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    /// Upper bound of input coordinates.
    pub input_amplitude: f64,
    /// Input vector size.
    pub input_size: usize,
    /// Output vector size.
    pub output_size: usize,
    /// `weight[i][k]` is the weight of the edge from `parents[i][k]` to `i`.
    pub weight: Vec<Vec<f64>>,
    /// Bias per source.
    pub bias: Vec<f64>,
    /// Last linear combination per source.
    pub linear_combination: Vec<f64>,
    /// Last result per source.
    pub result: Vec<f64>,
    /// Sorted children per source.
    pub children: Vec<Vec<usize>>,
    /// Sorted parents per source.
    pub parents: Vec<Vec<usize>>,
    /// Neurons in evaluation order.
    pub evaluation_order: Vec<usize>,
}

impl NetworkState {
    /// Total number of sources.
    #[must_use]
    pub fn total_sources(&self) -> usize {
        self.result.len()
    }

    /// Output vector of the last forward pass.
    #[must_use]
    pub fn output(&self) -> &[f64] {
        let total = self.total_sources();
        &self.result[total.saturating_sub(self.output_size)..]
    }

    /// Rebuild and validate the topology recorded in this snapshot.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InconsistentTopology`] if the adjacency arrays or
    /// order are invalid, [`GenerationError::InconsistentState`] if the
    /// numeric arrays do not fit them.
    pub fn topology(&self) -> Result<Topology, GenerationError> {
        let total = self.children.len();
        if self.output_size == 0 || self.output_size > total {
            return Err(GenerationError::InconsistentState(format!(
                "output size {} does not fit {} sources",
                self.output_size, total
            )));
        }
        let topology = Topology::from_parts(
            self.input_size,
            total - self.output_size,
            self.children.clone(),
            self.parents.clone(),
            self.evaluation_order.clone(),
        )?;
        self.check_arrays(&topology)?;
        Ok(topology)
    }

    /// Numeric arrays match the shape of `topology`.
    pub(crate) fn check_arrays(&self, topology: &Topology) -> Result<(), GenerationError> {
        let total = topology.total_sources();
        for (name, len) in [
            ("weight", self.weight.len()),
            ("bias", self.bias.len()),
            ("linear combination", self.linear_combination.len()),
            ("result", self.result.len()),
        ] {
            if len != total {
                return Err(GenerationError::InconsistentState(format!(
                    "{} vector has {} entries, topology has {} sources",
                    name, len, total
                )));
            }
        }
        if let Some(source) =
            (0..total).find(|&i| self.weight[i].len() != topology.parents(i).len())
        {
            return Err(GenerationError::InconsistentState(format!(
                "source {} has {} weights but {} parents",
                source,
                self.weight[source].len(),
                topology.parents(source).len()
            )));
        }
        Ok(())
    }
}

/// Mutable view over the live arrays of a network.
///
/// Only the owning network creates these, inside its critical section.
#[derive(Debug)]
pub struct StateView<'a> {
    /// Upper bound of input coordinates.
    pub input_amplitude: f64,
    /// Shared, read-only graph.
    pub topology: &'a Topology,
    /// Live weights, parallel to the topology's parent lists.
    pub weight: &'a mut [Vec<f64>],
    /// Live biases.
    pub bias: &'a mut [f64],
    /// Live linear combinations.
    pub linear_combination: &'a mut [f64],
    /// Live results. Input coordinates hold the raw input during evaluation.
    pub result: &'a mut [f64],
}

impl<'a> StateView<'a> {
    pub(crate) fn new(
        input_amplitude: f64,
        topology: &'a Topology,
        weight: &'a mut [Vec<f64>],
        bias: &'a mut [f64],
        linear_combination: &'a mut [f64],
        result: &'a mut [f64],
    ) -> Self {
        Self {
            input_amplitude,
            topology,
            weight,
            bias,
            linear_combination,
            result,
        }
    }

    /// Input vector size.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.topology.input_size()
    }

    /// Output vector size.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.topology.output_size()
    }

    /// Results of the surface neurons.
    #[must_use]
    pub fn output(&self) -> &[f64] {
        &self.result[self.topology.first_surface()..]
    }
}
