//! Global source graph assembled from a layer blueprint.
//!
//! Sources are indexed `0..total` and split into three contiguous ranges:
//! input coordinates `[0, first_neuron)`, hidden neurons
//! `[first_neuron, first_surface)` and surface neurons `[first_surface, total)`.
//!
//! The assembler asks each parent layer's distributor for child edges,
//! inverts them into parent lists and derives an evaluation order in which
//! every neuron follows all of its parents.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distribution::{check_in_range, check_no_duplicates};
use crate::error::GenerationError;
use crate::layer::{Layer, LayerBlueprint, LayerRole};

/// Produces the child edges of one parent layer.
///
/// `first..=last` is the child layer's range in global source indices; the
/// returned rows hold global indices too, one row per parent neuron.
pub trait ConnectionDistributor {
    /// Children of every neuron of `parent`.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`] the distributor raises.
    fn distribute(
        &self,
        parent: &Layer,
        first: usize,
        last: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<usize>>, GenerationError>;
}

/// Uses the [`Distribution`](crate::Distribution) recorded on each layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerDistributor;

impl ConnectionDistributor for LayerDistributor {
    fn distribute(
        &self,
        parent: &Layer,
        first: usize,
        last: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<usize>>, GenerationError> {
        parent
            .distribution
            .generate_connections(parent.neurons, first, last, parent.fan_out, rng)
    }
}

/// Immutable source graph with a precomputed evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TopologyRecord", into = "TopologyRecord")]
pub struct Topology {
    first_neuron: usize,
    first_surface: usize,
    /// Sorted child indices per source.
    children: Vec<Vec<usize>>,
    /// Sorted parent indices per source, the exact inverse of `children`.
    parents: Vec<Vec<usize>>,
    /// Every neuron index, parents first.
    order: Vec<usize>,
    /// First source index of each blueprint layer. Empty for topologies not
    /// generated from a blueprint.
    layer_offsets: Vec<usize>,
}

impl Topology {
    /// Assemble a topology from a blueprint using each layer's own
    /// distribution strategy.
    ///
    /// # Errors
    ///
    /// Fails if the blueprint is incomplete, a distributor rejects its
    /// parameters or output, or the evaluation order does not converge.
    pub fn generate(
        blueprint: &LayerBlueprint,
        rng: &mut dyn RngCore,
    ) -> Result<Self, GenerationError> {
        Self::generate_with(blueprint, &LayerDistributor, rng)
    }

    /// Assemble a topology with a custom distributor.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate). A row count that does not match the
    /// parent layer size is reported as
    /// [`GenerationError::InconsistentTopology`]; rows are sorted, then a
    /// child outside the neuron range or listed twice is reported as
    /// [`GenerationError::ChildOutOfRange`] or
    /// [`GenerationError::DuplicateEdge`]. The assembled graph passes the same
    /// checks as [`from_parts`](Self::from_parts).
    pub fn generate_with<D: ConnectionDistributor + ?Sized>(
        blueprint: &LayerBlueprint,
        distributor: &D,
        rng: &mut dyn RngCore,
    ) -> Result<Self, GenerationError> {
        let layers = blueprint.layers();
        if layers.len() < 2 {
            return Err(GenerationError::IncompleteBlueprint {
                layers: layers.len(),
            });
        }
        if layers.last().map(|l| l.role) != Some(LayerRole::Surface) {
            return Err(GenerationError::MissingSurfaceLayer);
        }

        let mut layer_offsets = Vec::with_capacity(layers.len());
        let mut total = 0;
        for layer in layers {
            layer_offsets.push(total);
            total += layer.neurons;
        }
        let first_neuron = layers[0].neurons;
        let first_surface = total - layers[layers.len() - 1].neurons;

        let mut children: Vec<Vec<usize>> = Vec::with_capacity(total);
        for (idx, pair) in layers.windows(2).enumerate() {
            let (parent, child) = (&pair[0], &pair[1]);
            let first = layer_offsets[idx + 1];
            let last = first + child.neurons - 1;
            let mut rows = distributor.distribute(parent, first, last, rng)?;
            if rows.len() != parent.neurons {
                return Err(GenerationError::InconsistentTopology(format!(
                    "layer {} has {} neurons but {} child rows were generated",
                    idx,
                    parent.neurons,
                    rows.len()
                )));
            }
            for row in &mut rows {
                row.sort_unstable();
            }
            // Input coordinates never take parents.
            check_in_range(&rows, first_neuron, total - 1)?;
            check_no_duplicates(&rows)?;
            children.extend(rows);
        }
        // Surface neurons have no children.
        children.resize_with(total, Vec::new);

        let parents = invert(&children);
        let order = evaluation_order(&children, &parents, first_neuron)?;

        let mut topology = Self::from_parts(first_neuron, first_surface, children, parents, order)?;
        topology.layer_offsets = layer_offsets;

        debug!(
            sources = total,
            first_neuron,
            first_surface,
            edges = topology.children.iter().map(Vec::len).sum::<usize>(),
            "generated layered topology"
        );
        Ok(topology)
    }

    /// Rebuild a topology from raw arrays, validating every structural
    /// invariant.
    ///
    /// # Errors
    ///
    /// [`GenerationError::InconsistentTopology`] describing the first
    /// violation found.
    pub fn from_parts(
        first_neuron: usize,
        first_surface: usize,
        children: Vec<Vec<usize>>,
        parents: Vec<Vec<usize>>,
        order: Vec<usize>,
    ) -> Result<Self, GenerationError> {
        let inconsistent = |msg: String| Err(GenerationError::InconsistentTopology(msg));
        let total = children.len();

        if parents.len() != total {
            return inconsistent(format!(
                "{} child lists but {} parent lists",
                total,
                parents.len()
            ));
        }
        if first_neuron == 0 || first_neuron > first_surface || first_surface >= total {
            return inconsistent(format!(
                "invalid source ranges: first neuron {}, first surface {}, total {}",
                first_neuron, first_surface, total
            ));
        }
        for (source, list) in children.iter().chain(&parents).enumerate() {
            let source = source % total;
            if list.windows(2).any(|pair| pair[0] >= pair[1]) {
                return inconsistent(format!("adjacency of source {} is not a sorted set", source));
            }
            if list.last().is_some_and(|&idx| idx >= total) {
                return inconsistent(format!("adjacency of source {} leaves the graph", source));
            }
        }
        let child_edges: usize = children.iter().map(Vec::len).sum();
        let parent_edges: usize = parents.iter().map(Vec::len).sum();
        if child_edges != parent_edges {
            return inconsistent(format!(
                "{} child edges but {} parent edges",
                child_edges, parent_edges
            ));
        }
        for (source, list) in children.iter().enumerate() {
            if let Some(&child) = list
                .iter()
                .find(|&&child| parents[child].binary_search(&source).is_err())
            {
                return inconsistent(format!(
                    "child {} of source {} does not list it as a parent",
                    child, source
                ));
            }
        }
        if let Some(input) = (0..first_neuron).find(|&i| !parents[i].is_empty()) {
            return inconsistent(format!("input coordinate {} has parents", input));
        }
        if let Some(neuron) = (first_neuron..total).find(|&i| parents[i].is_empty()) {
            return inconsistent(format!("neuron {} has no parents", neuron));
        }

        let mut position = vec![usize::MAX; total];
        if order.len() != total - first_neuron {
            return inconsistent(format!(
                "evaluation order lists {} neurons, expected {}",
                order.len(),
                total - first_neuron
            ));
        }
        for (pos, &neuron) in order.iter().enumerate() {
            if neuron < first_neuron || neuron >= total || position[neuron] != usize::MAX {
                return inconsistent(format!(
                    "evaluation order entry {} is not a fresh neuron index",
                    neuron
                ));
            }
            position[neuron] = pos;
        }
        for &neuron in &order {
            let late_parent = parents[neuron]
                .iter()
                .find(|&&p| p >= first_neuron && position[p] >= position[neuron]);
            if let Some(&parent) = late_parent {
                return inconsistent(format!(
                    "neuron {} is ordered before its parent {}",
                    neuron, parent
                ));
            }
        }

        Ok(Self {
            first_neuron,
            first_surface,
            children,
            parents,
            order,
            layer_offsets: Vec::new(),
        })
    }

    /// Total number of sources.
    #[inline]
    #[must_use]
    pub fn total_sources(&self) -> usize {
        self.children.len()
    }

    /// Index of the first neuron, equal to the input vector size.
    #[inline]
    #[must_use]
    pub fn first_neuron(&self) -> usize {
        self.first_neuron
    }

    /// Index of the first surface neuron.
    #[inline]
    #[must_use]
    pub fn first_surface(&self) -> usize {
        self.first_surface
    }

    /// Input vector size.
    #[inline]
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.first_neuron
    }

    /// Output vector size.
    #[inline]
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.total_sources() - self.first_surface
    }

    /// Sorted children of a source.
    #[inline]
    #[must_use]
    pub fn children(&self, source: usize) -> &[usize] {
        &self.children[source]
    }

    /// Sorted parents of a source.
    #[inline]
    #[must_use]
    pub fn parents(&self, source: usize) -> &[usize] {
        &self.parents[source]
    }

    /// Child lists of all sources.
    #[must_use]
    pub fn all_children(&self) -> &[Vec<usize>] {
        &self.children
    }

    /// Parent lists of all sources.
    #[must_use]
    pub fn all_parents(&self) -> &[Vec<usize>] {
        &self.parents
    }

    /// Neurons in evaluation order.
    #[inline]
    #[must_use]
    pub fn evaluation_order(&self) -> &[usize] {
        &self.order
    }

    /// First source index of each blueprint layer (empty unless generated).
    #[must_use]
    pub fn layer_offsets(&self) -> &[usize] {
        &self.layer_offsets
    }

    /// Short label of a source: `IN`, `HLn` for hidden layer `n` (plain `HL`
    /// without layer offsets), or `OUT`.
    #[must_use]
    pub fn source_kind(&self, source: usize) -> String {
        if source < self.first_neuron {
            "IN".to_string()
        } else if source >= self.first_surface {
            "OUT".to_string()
        } else {
            match self
                .layer_offsets
                .partition_point(|&start| start <= source)
                .checked_sub(1)
            {
                Some(layer) => format!("HL{}", layer),
                None => "HL".to_string(),
            }
        }
    }
}

/// Build parent lists from child lists.
///
/// One pass counts in-degrees, a second fills each parent list at its running
/// offset, then every list is sorted.
///
/// # Panics
///
/// If a child index is not below `children.len()`.
#[must_use]
pub fn invert(children: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut in_degree = vec![0usize; children.len()];
    for &child in children.iter().flatten() {
        in_degree[child] += 1;
    }

    let mut parents: Vec<Vec<usize>> = in_degree.iter().map(|&n| vec![0; n]).collect();
    let mut write_pos = vec![0usize; children.len()];
    for (source, list) in children.iter().enumerate() {
        for &child in list {
            parents[child][write_pos[child]] = source;
            write_pos[child] += 1;
        }
    }

    for list in &mut parents {
        list.sort_unstable();
    }
    parents
}

/// Relaxation-based topological order over all neurons.
///
/// Each sweep walks the whole source array and resolves every source whose
/// parents are all resolved, releasing its children. Input coordinates start
/// resolvable; a neuron without parents never becomes resolvable, so it is
/// reported together with cycles.
///
/// A graph that admits an order needs at most `total + 1` sweeps, so
/// exceeding that bound proves the graph is disconnected or cyclic.
///
/// # Errors
///
/// - [`GenerationError::InconsistentTopology`] if `first_neuron` exceeds the
///   source count, a child index leaves the graph, or the parent lists do not
///   match the child lists in length or in-degree.
/// - [`GenerationError::NonConvergentOrder`] when the watchdog trips.
pub fn evaluation_order(
    children: &[Vec<usize>],
    parents: &[Vec<usize>],
    first_neuron: usize,
) -> Result<Vec<usize>, GenerationError> {
    let total = children.len();
    let Some(neurons) = total.checked_sub(first_neuron) else {
        return Err(GenerationError::InconsistentTopology(format!(
            "first neuron {} beyond {} sources",
            first_neuron, total
        )));
    };
    if parents.len() != total {
        return Err(GenerationError::InconsistentTopology(format!(
            "{} child lists but {} parent lists",
            total,
            parents.len()
        )));
    }
    let mut in_degree = vec![0usize; total];
    for &child in children.iter().flatten() {
        match in_degree.get_mut(child) {
            Some(count) => *count += 1,
            None => {
                return Err(GenerationError::InconsistentTopology(format!(
                    "child index {} outside of {} sources",
                    child, total
                )))
            }
        }
    }
    if let Some(source) = (0..total).find(|&s| parents[s].len() != in_degree[s]) {
        return Err(GenerationError::InconsistentTopology(format!(
            "source {} lists {} parents but has {} incoming edges",
            source,
            parents[source].len(),
            in_degree[source]
        )));
    }
    let watchdog = total + 1;

    let mut unresolved = in_degree;
    let mut visited = vec![false; total];
    let mut order = Vec::with_capacity(neurons);

    let mut sweeps = 0;
    while order.len() < neurons {
        if sweeps > watchdog {
            return Err(GenerationError::NonConvergentOrder {
                sweeps,
                ordered: order.len(),
                neurons,
            });
        }
        for source in 0..total {
            let orphan = source >= first_neuron && parents[source].is_empty();
            if visited[source] || unresolved[source] != 0 || orphan {
                continue;
            }
            visited[source] = true;
            if source >= first_neuron {
                order.push(source);
            }
            for &child in &children[source] {
                unresolved[child] -= 1;
            }
        }
        sweeps += 1;
    }

    debug!(neurons, sweeps, "evaluation order converged");
    Ok(order)
}

impl fmt::Display for Topology {
    /// Table of sources: inputs first, then neurons in evaluation order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |list: &[usize]| {
            let items: Vec<String> = list.iter().map(|i| format!("{:<4}", i)).collect();
            format!("[{}]", items.join(" "))
        };
        let width = |lists: &[Vec<usize>], title: &str| {
            lists
                .iter()
                .map(|l| render(l).len())
                .max()
                .unwrap_or(0)
                .max(title.len())
        };
        let parent_width = width(&self.parents, "Parents");
        let child_width = width(&self.children, "Children");

        let header = format!(
            "| ##   | Type   | #P   | #C   | {:<pw$} | {:<cw$} |",
            "Parents",
            "Children",
            pw = parent_width,
            cw = child_width
        );
        let divider = "-".repeat(header.len());

        writeln!(f, " Topology of neural network:")?;
        writeln!(f, "{}", divider)?;
        writeln!(f, "{}", header)?;
        writeln!(f, "{}", divider)?;
        for source in (0..self.first_neuron).chain(self.order.iter().copied()) {
            writeln!(
                f,
                "| {:<4} | {:<6} | {:<4} | {:<4} | {:<pw$} | {:<cw$} |",
                source,
                self.source_kind(source),
                self.parents[source].len(),
                self.children[source].len(),
                render(&self.parents[source]),
                render(&self.children[source]),
                pw = parent_width,
                cw = child_width
            )?;
        }
        writeln!(f, "{}", divider)
    }
}

/// Flat serialized form of a [`Topology`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TopologyRecord {
    first_neuron: usize,
    first_surface: usize,
    children: Vec<Vec<usize>>,
    parents: Vec<Vec<usize>>,
    order: Vec<usize>,
    #[serde(default)]
    layer_offsets: Vec<usize>,
}

impl TryFrom<TopologyRecord> for Topology {
    type Error = GenerationError;

    fn try_from(record: TopologyRecord) -> Result<Self, Self::Error> {
        let mut topology = Self::from_parts(
            record.first_neuron,
            record.first_surface,
            record.children,
            record.parents,
            record.order,
        )?;
        check_layer_offsets(&record.layer_offsets, &topology)?;
        topology.layer_offsets = record.layer_offsets;
        Ok(topology)
    }
}

/// Layer offsets are either absent or strictly increasing from 0, with the
/// hidden layers starting at `first_neuron` and the last layer at
/// `first_surface`.
fn check_layer_offsets(offsets: &[usize], topology: &Topology) -> Result<(), GenerationError> {
    if offsets.is_empty() {
        return Ok(());
    }
    let well_formed = offsets.len() >= 2
        && offsets[0] == 0
        && offsets[1] == topology.first_neuron
        && offsets.last() == Some(&topology.first_surface)
        && offsets.windows(2).all(|pair| pair[0] < pair[1]);
    if well_formed {
        Ok(())
    } else {
        Err(GenerationError::InconsistentTopology(format!(
            "layer offsets {:?} do not match source ranges: first neuron {}, first surface {}",
            offsets, topology.first_neuron, topology.first_surface
        )))
    }
}

impl From<Topology> for TopologyRecord {
    fn from(topology: Topology) -> Self {
        Self {
            first_neuron: topology.first_neuron,
            first_surface: topology.first_surface,
            children: topology.children,
            parents: topology.parents,
            order: topology.order,
            layer_offsets: topology.layer_offsets,
        }
    }
}
