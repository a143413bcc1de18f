//! Edge gather and dependency chain construction.
//!
//! One sorted merge against the edge array resolves, for every slot touched
//! by the run, the static pre-batch value — delivered to the *first* touching
//! swap only. Later touchers are linked to their predecessor through
//! successor records, so downstream phases walk each slot's history as a
//! forward-only chain instead of re-reading the array.

use ems_core::{EmsError, ErrorInfo, SwapDescriptor, SwapId};
use ems_extsort::{SortedRun, Sorter, SorterConfig};

use crate::edge_list::EdgeList;
use crate::messages::{DependencyChainEdgeMsg, DependencyChainSuccessorMsg, SlotTouch};

/// Chain streams produced by the gather pass.
#[derive(Debug)]
pub(crate) struct DependencyChains {
    /// Static seed values, keyed `(swap, slot, edge)`.
    pub seeds: SortedRun<DependencyChainEdgeMsg>,
    /// Forward links, keyed `(swap, slot)`.
    pub successors: SortedRun<DependencyChainSuccessorMsg>,
}

/// Validates the run's descriptors and builds its dependency chains.
pub(crate) fn build_dependency_chains(
    edges: &EdgeList,
    swaps: &[SwapDescriptor],
    first_swap_id: u64,
    config: &SorterConfig,
) -> Result<DependencyChains, EmsError> {
    let mut touches = Sorter::new(config);
    for (offset, swap) in swaps.iter().enumerate() {
        let swap_id = SwapId::from_raw(first_swap_id + offset as u64);
        if swap.slots[0] == swap.slots[1] {
            return Err(EmsError::Input(
                ErrorInfo::new("duplicate-slot", "swap references one slot twice")
                    .with_context("swap", swap_id.as_raw().to_string())
                    .with_context("slot", swap.slots[0].as_raw().to_string()),
            ));
        }
        for slot in swap.slots {
            if slot.as_index() >= edges.len() {
                return Err(EmsError::Input(
                    ErrorInfo::new("slot-out-of-range", "swap references unknown slot")
                        .with_context("swap", swap_id.as_raw().to_string())
                        .with_context("slot", slot.as_raw().to_string())
                        .with_context("len", edges.len().to_string()),
                ));
            }
            touches.push(SlotTouch { slot, swap: swap_id })?;
        }
    }
    let touches = touches.finalize()?;

    let mut seeds = Sorter::new(config);
    let mut successors = Sorter::new(config);

    // merge-scan: touches ascend by slot, so the array cursor only moves forward
    let mut scan = edges.iter();
    let mut scan_pos = 0usize;
    let mut current = scan.next();
    let mut stream = touches.stream()?;
    let mut prev: Option<SlotTouch> = None;
    while let Some(touch) = stream.next_item()? {
        match prev {
            Some(previous) if previous.slot == touch.slot => {
                successors.push(DependencyChainSuccessorMsg {
                    swap: previous.swap,
                    slot: previous.slot,
                    successor: touch.swap,
                })?;
            }
            _ => {
                while scan_pos < touch.slot.as_index() {
                    current = scan.next();
                    scan_pos += 1;
                }
                let edge = current.ok_or_else(|| {
                    EmsError::Structure(
                        ErrorInfo::new("scan-exhausted", "edge array ended before touched slot")
                            .with_context("slot", touch.slot.as_raw().to_string()),
                    )
                })?;
                seeds.push(DependencyChainEdgeMsg {
                    swap: touch.swap,
                    slot: touch.slot,
                    edge,
                })?;
            }
        }
        prev = Some(touch);
    }

    Ok(DependencyChains {
        seeds: seeds.finalize()?,
        successors: successors.finalize()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_core::SlotId;

    fn slot(raw: u64) -> SlotId {
        SlotId::from_raw(raw)
    }

    fn drain<T: Ord + Clone + serde::de::DeserializeOwned>(run: &SortedRun<T>) -> Vec<T> {
        let mut stream = run.stream().unwrap();
        let mut out = Vec::new();
        while let Some(item) = stream.next_item().unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn each_touched_slot_gets_one_seed_and_chained_successors() {
        let edges = EdgeList::from_pairs([(1, 2), (3, 4), (5, 6)]);
        let swaps = vec![
            SwapDescriptor::new(slot(0), slot(1), false),
            SwapDescriptor::new(slot(1), slot(2), true),
            SwapDescriptor::new(slot(0), slot(1), false),
        ];
        let chains =
            build_dependency_chains(&edges, &swaps, 0, &SorterConfig::default()).unwrap();

        let seeds = drain(&chains.seeds);
        // three distinct slots touched, each seeded once at its first toucher
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0].swap, SwapId::from_raw(0));
        assert_eq!(seeds[0].slot, slot(0));
        assert_eq!(seeds[1].swap, SwapId::from_raw(0));
        assert_eq!(seeds[1].slot, slot(1));
        assert_eq!(seeds[2].swap, SwapId::from_raw(1));
        assert_eq!(seeds[2].slot, slot(2));

        let successors = drain(&chains.successors);
        // slot 0: 0 -> 2, slot 1: 0 -> 1 -> 2
        assert_eq!(successors.len(), 3);
        assert!(successors.contains(&DependencyChainSuccessorMsg {
            swap: SwapId::from_raw(0),
            slot: slot(0),
            successor: SwapId::from_raw(2),
        }));
        assert!(successors.contains(&DependencyChainSuccessorMsg {
            swap: SwapId::from_raw(0),
            slot: slot(1),
            successor: SwapId::from_raw(1),
        }));
        assert!(successors.contains(&DependencyChainSuccessorMsg {
            swap: SwapId::from_raw(1),
            slot: slot(1),
            successor: SwapId::from_raw(2),
        }));
    }

    #[test]
    fn self_referential_swap_is_rejected() {
        let edges = EdgeList::from_pairs([(1, 2), (3, 4)]);
        let swaps = vec![SwapDescriptor::new(slot(1), slot(1), false)];
        let err =
            build_dependency_chains(&edges, &swaps, 0, &SorterConfig::default()).unwrap_err();
        assert_eq!(err.info().code, "duplicate-slot");
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let edges = EdgeList::from_pairs([(1, 2)]);
        let swaps = vec![SwapDescriptor::new(slot(0), slot(5), false)];
        let err =
            build_dependency_chains(&edges, &swaps, 0, &SorterConfig::default()).unwrap_err();
        assert_eq!(err.info().code, "slot-out-of-range");
    }
}
