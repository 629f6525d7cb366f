//! Interconnection strategies between two adjacent layers.
//!
//! Every strategy answers the same question: given a parent layer of `N`
//! neurons, a contiguous child index range `[first, last]` of `M` neurons and
//! a fan-out `K`, which `K` children does each parent get?
//!
//! The child range is treated as a circle of `M` points. All strategies must
//! produce, for every parent, `K` distinct children sorted ascending, and every
//! child must end up with either `floor(N·K/M)` or `ceil(N·K/M)` parents.
//! These shared invariants are checked after generation by the free `check_*`
//! functions below; each strategy adds its own extra check on top.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GenerationError;

/// Shuffle attempts spent on one window of the random strategy before it
/// falls back to a relabelled interleaved layout.
pub const RANDOM_WINDOW_ATTEMPTS: usize = 1024;

/// Edge distribution strategy tag carried by every [`Layer`](crate::Layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Distribution {
    /// Each parent's children form one contiguous arc, arcs spread evenly
    /// around the child circle. Fastest; use it for full interconnection.
    #[default]
    Localized,
    /// Each parent's children are smeared evenly around the child circle,
    /// parents interleaved so fan-in stays uniform.
    Disperse,
    /// Random children per parent with uniform fan-in.
    Random,
}

impl Distribution {
    /// All strategies.
    pub const ALL: [Self; 3] = [Self::Localized, Self::Disperse, Self::Random];

    /// Human-readable description of the strategy.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Localized => {
                "Children of each parent form a continuous segment on the circle of the child layer, \
                 segments are spread uniformly over the circle. Fastest, suited for full interconnection."
            }
            Self::Disperse => {
                "Children of each parent are spread uniformly over the circle of the child layer, \
                 parents per child differ by at most one. Suited for ordinary sparse networks."
            }
            Self::Random => {
                "Children of each parent are random, parents per child differ by at most one."
            }
        }
    }

    /// Generate the children of every parent.
    ///
    /// Returns `parent_size` rows of `fan_out` child indices, each row sorted
    /// ascending, all indices within `[first, last]`.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::EmptyChildRange`] if `last < first`.
    /// - [`GenerationError::FanOutTooLarge`] if `fan_out` exceeds the child range.
    /// - [`GenerationError::InsufficientEdges`] if `fan_out · parent_size` can not
    ///   cover the child range.
    /// - any invariant error if the generated rows fail their checks.
    pub fn generate_connections(
        self,
        parent_size: usize,
        first: usize,
        last: usize,
        fan_out: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<usize>>, GenerationError> {
        let children = child_count(first, last)?;
        if fan_out > children {
            return Err(GenerationError::FanOutTooLarge { fan_out, children });
        }
        if fan_out.saturating_mul(parent_size) < children {
            return Err(GenerationError::InsufficientEdges {
                parents: parent_size,
                fan_out,
                children,
            });
        }

        let mut connections = match self {
            Self::Localized => localized(parent_size, children, fan_out),
            Self::Disperse => interleaved(parent_size, children, fan_out),
            Self::Random => random(parent_size, children, fan_out, rng),
        };
        for row in &mut connections {
            for child in row.iter_mut() {
                *child += first;
            }
            row.sort_unstable();
        }

        check_in_range(&connections, first, last)?;
        check_no_duplicates(&connections)?;
        check_uniformity(&connections, first, last)?;
        check_childless(&connections)?;
        match self {
            Self::Localized => check_contiguity(&connections, first, last)?,
            Self::Disperse => check_dispersion(&connections, first, last)?,
            Self::Random => {}
        }

        debug!(
            strategy = ?self,
            parents = parent_size,
            first,
            last,
            fan_out,
            "generated layer interconnection"
        );
        Ok(connections)
    }
}

/// Size of the child range `[first, last]`.
fn child_count(first: usize, last: usize) -> Result<usize, GenerationError> {
    last.checked_sub(first)
        .and_then(|span| span.checked_add(1))
        .ok_or(GenerationError::EmptyChildRange { first, last })
}

/// Wrap a possibly negative position onto the circle `[0, len)`.
fn normalize(position: isize, len: usize) -> usize {
    position.rem_euclid(len as isize) as usize
}

/// `round(numerator / denominator)` with halves rounded up, in exact integer arithmetic.
fn round_div(numerator: usize, denominator: usize) -> usize {
    (2 * numerator + denominator) / (2 * denominator)
}

fn localized(parent_size: usize, children: usize, fan_out: usize) -> Vec<Vec<usize>> {
    (0..parent_size)
        .map(|i| {
            // Arc centre of parent i sits at i·M/N on the child circle.
            let first_child = if fan_out % 2 == 1 {
                round_div(i * children, parent_size) as isize - (fan_out / 2) as isize
            } else {
                (i * children / parent_size) as isize - (fan_out / 2) as isize + 1
            };
            (0..fan_out)
                .map(|j| normalize(first_child + j as isize, children))
                .collect()
        })
        .collect()
}

/// Slot `(i, j)` of parent `i` lands at `round((j·N + i) · M / (N·K))`.
///
/// Parents interleave, so the `N·K` slots form one arithmetic progression
/// around the circle and every child collects `floor` or `ceil` of `N·K/M`
/// of them. Within a parent consecutive slots are `M/K` apart.
fn interleaved(parent_size: usize, children: usize, fan_out: usize) -> Vec<Vec<usize>> {
    let edges = parent_size * fan_out;
    (0..parent_size)
        .map(|i| {
            let mut row: Vec<usize> = Vec::with_capacity(fan_out);
            for j in 0..fan_out {
                let slot = j * parent_size + i;
                let mut child = round_div(slot * children, edges) % children;
                // Same-parent collision: move to the next free point of the circle.
                while row.contains(&child) {
                    child = (child + 1) % children;
                }
                row.push(child);
            }
            row
        })
        .collect()
}

/// Shuffle-and-fill over windows of exactly `M` slots.
///
/// The `N·K` slots, taken parent by parent, are cut into windows of `M`
/// consecutive slots (the last one may be shorter). Each window is filled from
/// a fresh shuffle of all children, so every child appears at most once per
/// window and fan-in stays uniform. A window whose fill gives some parent the
/// same child twice is refilled from scratch.
fn random(
    parent_size: usize,
    children: usize,
    fan_out: usize,
    rng: &mut dyn RngCore,
) -> Vec<Vec<usize>> {
    let total = parent_size * fan_out;
    let mut pool: Vec<usize> = (0..children).collect();
    let mut connections = vec![vec![0usize; fan_out]; parent_size];

    let mut start = 0;
    while start < total {
        let end = (start + children).min(total);
        let mut attempts = 0;
        loop {
            if attempts == RANDOM_WINDOW_ATTEMPTS {
                warn!(
                    parents = parent_size,
                    children,
                    fan_out,
                    attempts,
                    "random distribution stalled, falling back to relabelled interleaved layout"
                );
                return relabelled_interleaved(parent_size, children, fan_out, rng);
            }
            attempts += 1;
            pool.shuffle(rng);
            if fill_window(&mut connections, &pool, start, end, fan_out) {
                break;
            }
        }
        start = end;
    }
    connections
}

fn fill_window(
    connections: &mut [Vec<usize>],
    pool: &[usize],
    start: usize,
    end: usize,
    fan_out: usize,
) -> bool {
    for (slot, &child) in (start..end).zip(pool) {
        let (parent, j) = (slot / fan_out, slot % fan_out);
        if connections[parent][..j].contains(&child) {
            return false;
        }
        connections[parent][j] = child;
    }
    true
}

/// Interleaved layout with child labels permuted at random. Keeps every
/// invariant of [`interleaved`] and always terminates.
fn relabelled_interleaved(
    parent_size: usize,
    children: usize,
    fan_out: usize,
    rng: &mut dyn RngCore,
) -> Vec<Vec<usize>> {
    let mut labels: Vec<usize> = (0..children).collect();
    labels.shuffle(rng);
    interleaved(parent_size, children, fan_out)
        .into_iter()
        .map(|row| row.into_iter().map(|child| labels[child]).collect())
        .collect()
}

/// Every child lies within `[first, last]`.
pub fn check_in_range(
    connections: &[Vec<usize>],
    first: usize,
    last: usize,
) -> Result<(), GenerationError> {
    for (parent, row) in connections.iter().enumerate() {
        if let Some(&child) = row.iter().find(|&&c| c < first || c > last) {
            return Err(GenerationError::ChildOutOfRange {
                parent,
                child,
                first,
                last,
            });
        }
    }
    Ok(())
}

/// No parent lists the same child twice. Rows must be sorted.
pub fn check_no_duplicates(connections: &[Vec<usize>]) -> Result<(), GenerationError> {
    for (parent, row) in connections.iter().enumerate() {
        if let Some(pair) = row.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(GenerationError::DuplicateEdge {
                parent,
                child: pair[0],
            });
        }
    }
    Ok(())
}

/// Every parent has at least one child.
pub fn check_childless(connections: &[Vec<usize>]) -> Result<(), GenerationError> {
    match connections.iter().position(Vec::is_empty) {
        Some(parent) => Err(GenerationError::ChildlessParent { parent }),
        None => Ok(()),
    }
}

/// Parents per child differ by at most one over the whole child range,
/// children without parents included.
pub fn check_uniformity(
    connections: &[Vec<usize>],
    first: usize,
    last: usize,
) -> Result<(), GenerationError> {
    let mut fan_in = vec![0usize; child_count(first, last)?];
    check_in_range(connections, first, last)?;
    for &child in connections.iter().flatten() {
        fan_in[child - first] += 1;
    }
    let min = fan_in.iter().copied().min().unwrap_or(0);
    let max = fan_in.iter().copied().max().unwrap_or(0);
    if max - min > 1 {
        return Err(GenerationError::NonUniformFanIn { min, max });
    }
    Ok(())
}

/// Each row, seen as points on the child circle, is a single run: all
/// forward gaps are 1 except at most one.
pub fn check_contiguity(
    connections: &[Vec<usize>],
    first: usize,
    last: usize,
) -> Result<(), GenerationError> {
    let circle = child_count(first, last)?;
    check_in_range(connections, first, last)?;
    for (parent, row) in connections.iter().enumerate() {
        let breaks = circular_gaps(row, circle).filter(|&gap| gap != 1).count();
        if breaks > 1 {
            return Err(GenerationError::NonContiguousChildren { parent });
        }
    }
    Ok(())
}

/// Consecutive children of a parent are at least `floor(M / K)` steps apart
/// on the child circle.
pub fn check_dispersion(
    connections: &[Vec<usize>],
    first: usize,
    last: usize,
) -> Result<(), GenerationError> {
    let circle = child_count(first, last)?;
    check_in_range(connections, first, last)?;
    for (parent, row) in connections.iter().enumerate() {
        if row.len() < 2 {
            continue;
        }
        let minimum = circle / row.len();
        if let Some(distance) = circular_gaps(row, circle).min() {
            if distance < minimum {
                return Err(GenerationError::InsufficientDispersion {
                    parent,
                    distance,
                    minimum,
                });
            }
        }
    }
    Ok(())
}

/// Forward gaps between consecutive points of a row inside the circle,
/// closing the circle from the last point back to the first.
fn circular_gaps(row: &[usize], circle: usize) -> impl Iterator<Item = usize> + '_ {
    let gap = move |from: usize, to: usize| (to + circle - from) % circle;
    let closing = match (row.first(), row.last()) {
        (Some(&lo), Some(&hi)) if lo == hi => Some(circle),
        (Some(&lo), Some(&hi)) => Some(gap(hi, lo)),
        _ => None,
    };
    row.windows(2).map(move |pair| gap(pair[0], pair[1])).chain(closing)
}
