//! The external edge array and the update-application phase.

use std::collections::BTreeMap;

use ems_core::{Edge, EmsError, ErrorInfo, NodeId, SlotId};
use ems_extsort::SortedRun;
use sha2::{Digest, Sha256};

use crate::messages::EdgeUpdate;

/// Edge array addressed by stable slot ids.
///
/// Slot ids are positions and stay fixed across swaps; only the stored edge
/// values change. The engine reads the array in slot order and writes updates
/// back through a single sorted merge, never by random access. The in-memory
/// `Vec` backing is an implementation detail of this crate; all hot-path
/// traffic goes through [`EdgeList::iter`] and the sorted update merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeList {
    edges: Vec<Edge>,
}

impl EdgeList {
    /// Wraps an edge vector; the position of each edge becomes its slot id.
    pub fn new(edges: Vec<Edge>) -> Self {
        Self { edges }
    }

    /// Convenience constructor from raw endpoint pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u64, u64)>) -> Self {
        Self {
            edges: pairs
                .into_iter()
                .map(|(a, b)| Edge::new(NodeId::from_raw(a), NodeId::from_raw(b)))
                .collect(),
        }
    }

    /// Number of edge slots.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True when the array holds no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Value currently stored in `slot`, if the slot is valid.
    pub fn get(&self, slot: SlotId) -> Option<Edge> {
        self.edges.get(slot.as_index()).copied()
    }

    /// Sequential scan in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.iter().copied()
    }

    /// Borrowed view of the whole array in slot order.
    pub fn as_slice(&self) -> &[Edge] {
        &self.edges
    }

    /// Per-node degree counts; nodes without incident edges are absent.
    pub fn degree_sequence(&self) -> BTreeMap<NodeId, u64> {
        let mut degrees = BTreeMap::new();
        for edge in &self.edges {
            *degrees.entry(edge.lo()).or_insert(0) += 1;
            *degrees.entry(edge.hi()).or_insert(0) += 1;
        }
        degrees
    }

    /// Re-sorts the array by edge value for consumers that require canonical
    /// ordering. Destroys the slot-id correspondence; never called between
    /// swap runs.
    pub fn canonicalize(&mut self) {
        self.edges.sort_unstable();
    }

    /// Canonical SHA-256 digest of the edge multiset, independent of slot
    /// order. Used for determinism checks.
    pub fn canonical_digest(&self) -> String {
        let mut sorted = self.edges.clone();
        sorted.sort_unstable();
        let mut hasher = Sha256::new();
        hasher.update((sorted.len() as u64).to_le_bytes());
        for edge in sorted {
            hasher.update(edge.lo().as_raw().to_le_bytes());
            hasher.update(edge.hi().as_raw().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Merges final per-slot values back into the array.
    ///
    /// The update run is keyed by slot id; one sequential sweep writes each
    /// touched slot once and leaves untouched slots alone.
    pub(crate) fn apply_updates(&mut self, updates: &SortedRun<EdgeUpdate>) -> Result<(), EmsError> {
        let mut stream = updates.stream()?;
        let mut prev: Option<SlotId> = None;
        while let Some(update) = stream.next_item()? {
            if prev.map_or(false, |slot| slot >= update.slot) {
                return Err(EmsError::Structure(
                    ErrorInfo::new("duplicate-update", "slot received more than one final value")
                        .with_context("slot", update.slot.as_raw().to_string()),
                ));
            }
            match self.edges.get_mut(update.slot.as_index()) {
                Some(value) => *value = update.edge,
                None => {
                    return Err(EmsError::Structure(
                        ErrorInfo::new("update-out-of-range", "final value targets unknown slot")
                            .with_context("slot", update.slot.as_raw().to_string())
                            .with_context("len", self.edges.len().to_string()),
                    ))
                }
            }
            prev = Some(update.slot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_extsort::{Sorter, SorterConfig};

    fn edge(a: u64, b: u64) -> Edge {
        Edge::new(NodeId::from_raw(a), NodeId::from_raw(b))
    }

    #[test]
    fn digest_ignores_slot_order() {
        let a = EdgeList::from_pairs([(1, 2), (3, 4)]);
        let b = EdgeList::from_pairs([(3, 4), (2, 1)]);
        assert_eq!(a.canonical_digest(), b.canonical_digest());
    }

    #[test]
    fn degree_sequence_counts_both_endpoints() {
        let list = EdgeList::from_pairs([(1, 2), (2, 3)]);
        let degrees = list.degree_sequence();
        assert_eq!(degrees[&NodeId::from_raw(1)], 1);
        assert_eq!(degrees[&NodeId::from_raw(2)], 2);
        assert_eq!(degrees[&NodeId::from_raw(3)], 1);
    }

    #[test]
    fn updates_merge_by_slot() {
        let mut list = EdgeList::from_pairs([(1, 2), (3, 4), (5, 6)]);
        let mut sorter = Sorter::new(&SorterConfig::default());
        sorter
            .push(EdgeUpdate {
                slot: SlotId::from_raw(2),
                edge: edge(5, 7),
            })
            .unwrap();
        sorter
            .push(EdgeUpdate {
                slot: SlotId::from_raw(0),
                edge: edge(1, 8),
            })
            .unwrap();
        let run = sorter.finalize().unwrap();
        list.apply_updates(&run).unwrap();
        assert_eq!(list.get(SlotId::from_raw(0)), Some(edge(1, 8)));
        assert_eq!(list.get(SlotId::from_raw(1)), Some(edge(3, 4)));
        assert_eq!(list.get(SlotId::from_raw(2)), Some(edge(5, 7)));
    }

    #[test]
    fn duplicate_update_for_one_slot_is_structural() {
        let mut list = EdgeList::from_pairs([(1, 2)]);
        let mut sorter = Sorter::new(&SorterConfig::default());
        for value in [edge(3, 4), edge(5, 6)] {
            sorter
                .push(EdgeUpdate {
                    slot: SlotId::from_raw(0),
                    edge: value,
                })
                .unwrap();
        }
        let run = sorter.finalize().unwrap();
        let err = list.apply_updates(&run).unwrap_err();
        assert_eq!(err.info().code, "duplicate-update");
    }
}
