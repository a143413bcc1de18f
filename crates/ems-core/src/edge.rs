//! Edges, swap descriptors and per-swap outcome traces.

use serde::{Deserialize, Serialize};

use crate::{NodeId, SlotId};

/// Canonicalized unordered pair of node identifiers.
///
/// The constructor normalizes the pair so that `lo() <= hi()`, which makes the
/// derived lexicographic ordering a total order over edge values and lets the
/// existence resolver group equal values by a plain sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    lo: NodeId,
    hi: NodeId,
}

impl Edge {
    /// Creates a canonicalized edge from two endpoints in any order.
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Smaller endpoint.
    pub fn lo(&self) -> NodeId {
        self.lo
    }

    /// Larger endpoint.
    pub fn hi(&self) -> NodeId {
        self.hi
    }

    /// True if both endpoints coincide.
    pub fn is_loop(&self) -> bool {
        self.lo == self.hi
    }

    /// Recombines the four endpoints of two edges into two candidate edges.
    ///
    /// With `direction == false` the smaller endpoints are paired together,
    /// with `direction == true` each smaller endpoint is paired with the other
    /// edge's larger endpoint. Either way every node keeps its degree.
    pub fn recombine(a: Edge, b: Edge, direction: bool) -> (Edge, Edge) {
        if direction {
            (Edge::new(a.lo, b.hi), Edge::new(a.hi, b.lo))
        } else {
            (Edge::new(a.lo, b.lo), Edge::new(a.hi, b.hi))
        }
    }
}

/// A single requested double-edge swap.
///
/// The swap id is implicit: it is the position of the descriptor within the
/// batch stream handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapDescriptor {
    /// The two distinct slots whose edges take part in the swap.
    pub slots: [SlotId; 2],
    /// Selects which recombination of the four endpoints is attempted.
    pub direction: bool,
}

impl SwapDescriptor {
    /// Creates a descriptor for the given slots and direction bit.
    pub fn new(first: SlotId, second: SlotId, direction: bool) -> Self {
        Self {
            slots: [first, second],
            direction,
        }
    }
}

/// Outcome trace emitted for every requested swap, performed or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResult {
    /// The two candidate edges the swap attempted to create.
    pub edges: [Edge; 2],
    /// True if either candidate was a self-loop.
    pub loop_detected: bool,
    /// Per-candidate duplicate-edge conflict flags.
    pub conflict: [bool; 2],
    /// True iff the swap was committed to the edge array.
    pub performed: bool,
}

impl SwapResult {
    /// Orders the candidate pair so traces compare independently of slot order.
    pub fn normalize(&mut self) {
        if self.edges[1] < self.edges[0] {
            self.edges.swap(0, 1);
            self.conflict.swap(0, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn edge_is_canonicalized() {
        assert_eq!(Edge::new(node(5), node(2)), Edge::new(node(2), node(5)));
        assert_eq!(Edge::new(node(5), node(2)).lo(), node(2));
        assert!(Edge::new(node(3), node(3)).is_loop());
    }

    #[test]
    fn recombine_preserves_endpoints() {
        let a = Edge::new(node(1), node(2));
        let b = Edge::new(node(3), node(4));
        let (c0, c1) = Edge::recombine(a, b, false);
        assert_eq!(c0, Edge::new(node(1), node(3)));
        assert_eq!(c1, Edge::new(node(2), node(4)));
        let (d0, d1) = Edge::recombine(a, b, true);
        assert_eq!(d0, Edge::new(node(1), node(4)));
        assert_eq!(d1, Edge::new(node(2), node(3)));
    }

    #[test]
    fn normalize_orders_candidates_and_flags() {
        let mut result = SwapResult {
            edges: [Edge::new(node(7), node(8)), Edge::new(node(1), node(2))],
            loop_detected: false,
            conflict: [true, false],
            performed: false,
        };
        result.normalize();
        assert_eq!(result.edges[0], Edge::new(node(1), node(2)));
        assert_eq!(result.conflict, [false, true]);
    }
}
