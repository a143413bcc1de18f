#![deny(missing_docs)]

//! Core identifiers and data model shared by the EMS edge-swap engine crates.

use serde::{Deserialize, Serialize};

pub mod edge;
pub mod errors;

pub use edge::{Edge, SwapDescriptor, SwapResult};
pub use errors::{EmsError, ErrorInfo};

/// Identifier for a node of the graph being randomized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Stable positional identity of an edge within the external edge array.
///
/// The slot survives swaps even though the edge value stored in it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(u64);

impl SlotId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns the slot as an index into the edge array.
    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

/// Logical time of a swap within a batch; unique and strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SwapId(u64);

impl SwapId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}
