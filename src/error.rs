//! Error types.
//!
//! Failures fall into two families:
//! - [`GenerationError`]: raised while a network is being built. Fatal; no
//!   partially-built network is ever returned.
//! - [`RuntimeError`]: raised by a single `evaluate`/`train` call. The live
//!   network is left untouched and the caller may retry with corrected input.

use thiserror::Error;

/// Construction-time failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// The first layer of a blueprint must carry the input role.
    #[error("layer 0: first layer must be the input vector layer")]
    FirstLayerNotInput,

    /// An input layer was added to a blueprint that already has one.
    #[error("layer {layer}: input vector layer already exists")]
    DuplicateInputLayer {
        /// Position the rejected layer would have taken.
        layer: usize,
    },

    /// A layer was added after the surface layer.
    #[error("layer {layer}: last layer is a surface layer, no other layers may be added")]
    LayerAfterSurface {
        /// Position the rejected layer would have taken.
        layer: usize,
    },

    /// Fan-out must be at least 1.
    #[error("layer {layer}: number of children per neuron must be a positive integer")]
    ZeroFanOut {
        /// Position of the rejected layer.
        layer: usize,
    },

    /// Neuron count must be at least 1.
    #[error("layer {layer}: number of neurons must be a positive integer")]
    ZeroNeurons {
        /// Position of the rejected layer.
        layer: usize,
    },

    /// The previous layer wants more children per neuron than this layer has.
    #[error(
        "layer {layer}: each previous layer neuron has {fan_out} children, \
         but there are only {neurons} neurons in the layer to add"
    )]
    FanOutExceedsNextLayer {
        /// Position of the rejected layer.
        layer: usize,
        /// Fan-out of the previous layer.
        fan_out: usize,
        /// Neuron count of the rejected layer.
        neurons: usize,
    },

    /// A blueprint needs an input layer and at least one more layer.
    #[error("blueprint has {layers} layer(s), at least 2 are required")]
    IncompleteBlueprint {
        /// Number of layers present.
        layers: usize,
    },

    /// The last layer of a blueprint handed to the assembler must be a surface layer.
    #[error("blueprint does not end with a surface layer")]
    MissingSurfaceLayer,

    /// The child range `[first, last]` holds no index.
    #[error("child range [{first}, {last}] is empty")]
    EmptyChildRange {
        /// First index of the child range.
        first: usize,
        /// Last index of the child range.
        last: usize,
    },

    /// Fan-out larger than the child range.
    #[error("fan-out {fan_out} exceeds child layer size {children}")]
    FanOutTooLarge {
        /// Requested children per parent.
        fan_out: usize,
        /// Size of the child range.
        children: usize,
    },

    /// Not enough edges to give every child a parent.
    #[error("{parents} parents with fan-out {fan_out} can not cover {children} children")]
    InsufficientEdges {
        /// Size of the parent layer.
        parents: usize,
        /// Requested children per parent.
        fan_out: usize,
        /// Size of the child range.
        children: usize,
    },

    /// A generated child index lies outside the requested child range.
    #[error("parent {parent}: child {child} lies outside [{first}, {last}]")]
    ChildOutOfRange {
        /// Parent position within its layer.
        parent: usize,
        /// Offending child index.
        child: usize,
        /// First index of the child range.
        first: usize,
        /// Last index of the child range.
        last: usize,
    },

    /// The same child was listed twice for one parent.
    #[error("parent {parent}: equal connection to child {child} encountered")]
    DuplicateEdge {
        /// Parent position within its layer.
        parent: usize,
        /// Duplicated child index.
        child: usize,
    },

    /// A parent received no children.
    #[error("parent {parent}: childless neuron encountered")]
    ChildlessParent {
        /// Parent position within its layer.
        parent: usize,
    },

    /// Parents per child differ by more than one across the child range.
    #[error("parents per child range from {min} to {max}, difference must not exceed 1")]
    NonUniformFanIn {
        /// Smallest in-degree seen.
        min: usize,
        /// Largest in-degree seen.
        max: usize,
    },

    /// Localized children do not form a single run on the child circle.
    #[error("parent {parent}: set of children is not continuous")]
    NonContiguousChildren {
        /// Parent position within its layer.
        parent: usize,
    },

    /// Disperse children are closer than `floor(children / fan_out)` steps.
    #[error("parent {parent}: distance between children is {distance}, must not be less than {minimum}")]
    InsufficientDispersion {
        /// Parent position within its layer.
        parent: usize,
        /// Shortest circular gap found.
        distance: usize,
        /// Required minimum gap.
        minimum: usize,
    },

    /// The relaxation sweep could not order every neuron: the graph is
    /// disconnected or cyclic.
    #[error(
        "evaluation order did not converge after {sweeps} sweeps ({ordered} of {neurons} neurons ordered), \
         topology is disconnected or cyclic"
    )]
    NonConvergentOrder {
        /// Sweeps performed before the watchdog tripped.
        sweeps: usize,
        /// Neurons ordered so far.
        ordered: usize,
        /// Total neuron count.
        neurons: usize,
    },

    /// Adjacency arrays or the evaluation order violate a structural invariant.
    #[error("inconsistent topology: {0}")]
    InconsistentTopology(String),

    /// A state record does not match its topology or the target network.
    #[error("inconsistent network state: {0}")]
    InconsistentState(String),

    /// Input amplitude too small to keep initial biases out of saturation.
    #[error("input amplitude {amplitude} must be a finite number greater than {minimum}")]
    AmplitudeTooSmall {
        /// Requested amplitude.
        amplitude: f64,
        /// Exclusive lower bound.
        minimum: f64,
    },

    /// Input or output vector size of zero.
    #[error("{which} vector size must be a positive integer")]
    ZeroVectorSize {
        /// `"input"` or `"output"`.
        which: &'static str,
    },

    /// Settings sizes disagree with the supplied topology.
    #[error("{which} vector size {settings} does not match topology size {topology}")]
    SizeMismatch {
        /// `"input"` or `"output"`.
        which: &'static str,
        /// Size declared in the settings.
        settings: usize,
        /// Size implied by the topology.
        topology: usize,
    },

    /// A pluggable policy failed its validity check.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}

/// Per-call failure. The network is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Input vector has the wrong number of coordinates.
    #[error("input vector has cardinality of {actual}, network accepts only {expected}")]
    InputCardinality {
        /// Network input size.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Input coordinate outside `[0, amplitude]` (or NaN).
    #[error("input vector coordinate {index} has value of {value}, which is out of bounds [0, {amplitude}]")]
    InputOutOfRange {
        /// Coordinate index.
        index: usize,
        /// Offending value.
        value: f64,
        /// Network input amplitude.
        amplitude: f64,
    },

    /// Reference vector has the wrong number of components.
    #[error("reference vector has cardinality of {actual}, network accepts only {expected}")]
    ReferenceCardinality {
        /// Network output size.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Reference component outside `[0, 1]` (or NaN).
    #[error("reference vector coordinate {index} has value of {value}, which is out of bounds [0, 1]")]
    ReferenceOutOfRange {
        /// Component index.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// Gradient training was requested with an evaluator that exposes no
    /// differentiable activation.
    #[error("backpropagation requires an evaluator with a differentiable activation function")]
    NonDifferentiableEvaluator,
}
