//! Typed records flowing between pipeline phases.
//!
//! Each record type doubles as its own sort key: the derived (or, for
//! [`ExistenceRequestMsg`], hand-written) ordering is exactly the order the
//! consuming phase sweeps in, so a sorted run of these records *is* the
//! channel between two phases.

use std::cmp::Ordering;

use ems_core::{Edge, SlotId, SwapDescriptor, SwapId};
use serde::{Deserialize, Serialize};

/// Association of one touched slot with the swap touching it.
///
/// Sorted by `(slot, swap)`, which groups every slot's touching swaps in
/// ascending logical time for the dependency chain builder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct SlotTouch {
    pub slot: SlotId,
    pub swap: SwapId,
}

/// "As of `swap`, `slot` holds `edge`."
///
/// Seeds carry the static pre-batch value to a slot's first touching swap;
/// forwarded copies carry chain-propagated values to later touchers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct DependencyChainEdgeMsg {
    pub swap: SwapId,
    pub slot: SlotId,
    pub edge: Edge,
}

/// Links `swap` to the next swap touching the same slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct DependencyChainSuccessorMsg {
    pub swap: SwapId,
    pub slot: SlotId,
    pub successor: SwapId,
}

/// Query: "does `edge` exist anywhere in the graph just before `swap`?"
///
/// `forward_only` requests come from a swap's possible source values: the
/// swap only needs to sit in the value's notification chain, not learn the
/// static answer. Candidate queries use `forward_only = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct ExistenceRequestMsg {
    pub edge: Edge,
    pub swap: SwapId,
    pub forward_only: bool,
}

impl Ord for ExistenceRequestMsg {
    /// Edge value ascending, then swap id *descending*, then `forward_only`
    /// with `false` first. The descending swap order lets the resolver sweep
    /// each value group from the latest requester to the earliest, and the
    /// `forward_only` tie-break keeps a swap's own two candidate queries from
    /// racing each other. Load-bearing; do not change.
    fn cmp(&self, other: &Self) -> Ordering {
        self.edge
            .cmp(&other.edge)
            .then_with(|| other.swap.cmp(&self.swap))
            .then_with(|| self.forward_only.cmp(&other.forward_only))
    }
}

impl PartialOrd for ExistenceRequestMsg {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Resolved answer: "just before `swap`, `edge` exists (or not)."
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct ExistenceInfoMsg {
    pub swap: SwapId,
    pub edge: Edge,
    pub exists: bool,
}

/// Tells `swap` to forward its post-state for `edge` to `successor`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct ExistenceSuccessorMsg {
    pub swap: SwapId,
    pub edge: Edge,
    pub successor: SwapId,
}

/// Final value for a slot, merged back into the edge array after a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub(crate) struct EdgeUpdate {
    pub slot: SlotId,
    pub edge: Edge,
}

/// Maps a slot back to its position (0 or 1) within a swap descriptor.
pub(crate) fn side_of(swap: &SwapDescriptor, slot: SlotId) -> Option<usize> {
    if swap.slots[0] == slot {
        Some(0)
    } else if swap.slots[1] == slot {
        Some(1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_core::NodeId;

    fn edge(a: u64, b: u64) -> Edge {
        Edge::new(NodeId::from_raw(a), NodeId::from_raw(b))
    }

    fn request(a: u64, b: u64, swap: u64, forward_only: bool) -> ExistenceRequestMsg {
        ExistenceRequestMsg {
            edge: edge(a, b),
            swap: SwapId::from_raw(swap),
            forward_only,
        }
    }

    #[test]
    fn requests_group_by_edge_then_descend_by_swap() {
        let mut requests = vec![
            request(1, 2, 3, false),
            request(1, 3, 9, false),
            request(1, 2, 7, true),
            request(1, 3, 2, true),
        ];
        requests.sort_unstable();
        assert_eq!(
            requests,
            vec![
                request(1, 2, 7, true),
                request(1, 2, 3, false),
                request(1, 3, 9, false),
                request(1, 3, 2, true),
            ]
        );
    }

    #[test]
    fn forward_only_false_sorts_first_within_a_swap() {
        let mut requests = vec![request(4, 5, 6, true), request(4, 5, 6, false)];
        requests.sort_unstable();
        assert!(!requests[0].forward_only);
        assert!(requests[1].forward_only);
    }

    #[test]
    fn slot_touches_group_by_slot() {
        let mut touches = vec![
            SlotTouch {
                slot: SlotId::from_raw(5),
                swap: SwapId::from_raw(0),
            },
            SlotTouch {
                slot: SlotId::from_raw(2),
                swap: SwapId::from_raw(1),
            },
            SlotTouch {
                slot: SlotId::from_raw(5),
                swap: SwapId::from_raw(2),
            },
        ];
        touches.sort_unstable();
        assert_eq!(touches[0].slot, SlotId::from_raw(2));
        assert_eq!(touches[1].swap, SwapId::from_raw(0));
        assert_eq!(touches[2].swap, SwapId::from_raw(2));
    }
}
