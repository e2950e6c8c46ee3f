//! A process placement library that maps communicating entities onto the
//! leaves of a hierarchical hardware topology.
//!
//! # Crate Layout
//!
//! The entry point is [`TreeBuilder`], which turns a [`CommMatrix`] and a
//! [`TopologyShape`] into a [`PlacementTree`] whose leaves carry the entity
//! bound to each physical slot.  At every topology level the builder asks a
//! partitioning algorithm for a balanced k-way split of the current
//! sub-problem, then recurses into each part.
//!
//! Partitioning algorithms implement the [`Partition`] trait and can also be
//! used standalone:
//!
//! - [`Greedy`]: randomized seeding followed by greedy affinity growth,
//!   best result kept over a bounded number of trials,
//! - [`External`]: an adapter around a balanced graph partitioner with
//!   fixed-vertex support (see [`FixedVertexBackend`]), with exact-balance
//!   verification and automatic fallback to [`Greedy`].

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    rust_2018_idioms
)]

mod algorithms;
pub mod imbalance;
mod matrix;
mod split;
mod topology;
mod tree;

pub use crate::algorithms::*;
pub use crate::matrix::CommMatrix;
pub use crate::topology::TopologyShape;
pub use crate::tree::Node;
pub use crate::tree::NodeId;
pub use crate::tree::PlacementTree;
pub use crate::tree::TreeBuilder;

pub use rand;
pub use sprs;

/// The `Partition` trait allows for partitioning data.
///
/// Partitioning algorithms implement this trait.
///
/// The generic argument `M` defines the input of the algorithms (e.g. a
/// communication matrix together with a constraint list).
///
/// The input partition must be of the correct size and its contents may or may
/// not be used by the algorithms.
pub trait Partition<M> {
    /// Diagnostic data returned for a specific run of the algorithm.
    type Metadata;

    /// Error details, should the algorithm fail to run.
    type Error;

    /// Partition the given data and output the part ID of each element in
    /// `part_ids`.
    ///
    /// Part IDs must be contiguous and start from zero, meaning the number of
    /// parts is one plus the maximum of `part_ids`.  If a lower ID does not
    /// appear in the array, the part is assumed to be empty.
    fn partition(&mut self, part_ids: &mut [usize], data: M)
    -> Result<Self::Metadata, Self::Error>;
}
