//! Existence request generation and resolution.
//!
//! Whether a swap is committed depends on decisions made for earlier swaps,
//! which are unknown while this phase runs. Each slot therefore carries a
//! small *set* of possible values along its dependency chain: the first
//! toucher starts from the static seed, and every swap forwards the union of
//! its inherited values and the candidates it could create. Existence
//! requests are issued for every possible source value and every possible
//! non-loop candidate, so the executor later finds an answer for whichever
//! combination turns out to be real.

use ems_core::{Edge, EmsError, ErrorInfo, SlotId, SwapDescriptor, SwapId};
use ems_extsort::{MergeStream, PushMerge, SortedRun, Sorter, SorterConfig};

use crate::edge_list::EdgeList;
use crate::gather::DependencyChains;
use crate::messages::{
    side_of, DependencyChainEdgeMsg, DependencyChainSuccessorMsg, ExistenceInfoMsg,
    ExistenceRequestMsg, ExistenceSuccessorMsg,
};

/// Resolved existence streams consumed by the executor.
pub(crate) struct ExistenceTables {
    /// Static answers, addressed to the earliest requester of each value.
    pub infos: SortedRun<ExistenceInfoMsg>,
    /// Per-value notification chains, keyed `(swap, edge)`.
    pub successors: SortedRun<ExistenceSuccessorMsg>,
}

/// Sweeps the run's swaps in ascending order and emits existence requests.
pub(crate) fn generate_requests(
    swaps: &[SwapDescriptor],
    first_swap_id: u64,
    chains: &DependencyChains,
    config: &SorterConfig,
) -> Result<SortedRun<ExistenceRequestMsg>, EmsError> {
    let mut values = PushMerge::new(chains.seeds.stream()?);
    let mut successors = chains.successors.stream()?;
    let mut requests = Sorter::new(config);

    for (offset, swap) in swaps.iter().enumerate() {
        let swap_id = SwapId::from_raw(first_swap_id + offset as u64);

        let possible = collect_possible_values(&mut values, swap, swap_id)?;
        let next_on = collect_successors(&mut successors, swap, swap_id)?;

        // a swap may destroy any of its possible source values
        for side in 0..2 {
            for value in &possible[side] {
                requests.push(ExistenceRequestMsg {
                    edge: *value,
                    swap: swap_id,
                    forward_only: true,
                })?;
            }
        }

        // and may create any recombination of them
        let mut created: [Vec<Edge>; 2] = [Vec::new(), Vec::new()];
        for a in &possible[0] {
            for b in &possible[1] {
                let (c0, c1) = Edge::recombine(*a, *b, swap.direction);
                for (side, candidate) in [(0usize, c0), (1usize, c1)] {
                    if candidate.is_loop() {
                        // rejected locally by the executor; loops never materialize
                        continue;
                    }
                    requests.push(ExistenceRequestMsg {
                        edge: candidate,
                        swap: swap_id,
                        forward_only: false,
                    })?;
                    created[side].push(candidate);
                }
            }
        }

        for side in 0..2 {
            if let Some(successor) = next_on[side] {
                let mut forward = possible[side].clone();
                forward.extend(created[side].iter().copied());
                forward.sort_unstable();
                forward.dedup();
                for value in forward {
                    values.push(DependencyChainEdgeMsg {
                        swap: successor,
                        slot: swap.slots[side],
                        edge: value,
                    });
                }
            }
        }
    }

    if values.peek().is_some() || successors.peek().is_some() {
        return Err(orphan_message("conflict"));
    }
    requests.finalize()
}

/// Drains all possible-value messages addressed to `swap_id`.
fn collect_possible_values(
    values: &mut PushMerge<'_, DependencyChainEdgeMsg>,
    swap: &SwapDescriptor,
    swap_id: SwapId,
) -> Result<[Vec<Edge>; 2], EmsError> {
    let mut possible: [Vec<Edge>; 2] = [Vec::new(), Vec::new()];
    while values.peek().map_or(false, |msg| msg.swap == swap_id) {
        let Some(msg) = values.next_item()? else {
            break;
        };
        let side = side_of(swap, msg.slot).ok_or_else(|| foreign_slot(swap_id, msg.slot))?;
        // messages arrive sorted, so duplicates are adjacent
        if possible[side].last() != Some(&msg.edge) {
            possible[side].push(msg.edge);
        }
    }
    if possible[0].is_empty() || possible[1].is_empty() {
        return Err(EmsError::Structure(
            ErrorInfo::new("missing-chain-value", "no value reached a swap's slot")
                .with_context("swap", swap_id.as_raw().to_string()),
        ));
    }
    Ok(possible)
}

/// Drains the dependency successor links addressed to `swap_id`.
pub(crate) fn collect_successors(
    successors: &mut MergeStream<'_, DependencyChainSuccessorMsg>,
    swap: &SwapDescriptor,
    swap_id: SwapId,
) -> Result<[Option<SwapId>; 2], EmsError> {
    let mut next_on: [Option<SwapId>; 2] = [None, None];
    while successors.peek().map_or(false, |msg| msg.swap == swap_id) {
        let Some(msg) = successors.next_item()? else {
            break;
        };
        let side = side_of(swap, msg.slot).ok_or_else(|| foreign_slot(swap_id, msg.slot))?;
        if next_on[side].is_some() {
            return Err(EmsError::Structure(
                ErrorInfo::new("forked-chain", "slot has two successors at one swap")
                    .with_context("swap", swap_id.as_raw().to_string())
                    .with_context("slot", msg.slot.as_raw().to_string()),
            ));
        }
        next_on[side] = Some(msg.successor);
    }
    Ok(next_on)
}

/// Resolves the request stream against the static edge values and builds the
/// per-value notification chains.
///
/// Requests arrive grouped by edge value, latest swap first. Within a group
/// each distinct swap is linked to the next later one, and the earliest swap
/// receives the static answer. Every later member of the chain is fed by its
/// predecessor during execution, so each query has exactly one answer.
pub(crate) fn resolve_requests(
    edges: &EdgeList,
    requests: &SortedRun<ExistenceRequestMsg>,
    config: &SorterConfig,
) -> Result<ExistenceTables, EmsError> {
    // the one graph-sized sort of a run: static facts keyed by edge value
    let mut value_sorter = Sorter::new(config);
    for edge in edges.iter() {
        value_sorter.push(edge)?;
    }
    let static_values = value_sorter.finalize()?;
    let mut facts = static_values.stream()?;

    let mut stream = requests.stream()?;
    let mut infos = Sorter::new(config);
    let mut successors = Sorter::new(config);

    while let Some(head) = stream.peek() {
        let value = head.edge;
        while facts.peek().map_or(false, |fact| *fact < value) {
            facts.next_item()?;
        }
        let mut exists = false;
        while facts.peek() == Some(&value) {
            exists = true;
            facts.next_item()?;
        }

        let mut later: Option<SwapId> = None;
        while stream.peek().map_or(false, |req| req.edge == value) {
            let Some(request) = stream.next_item()? else {
                break;
            };
            if later == Some(request.swap) {
                // same swap requested the value in both roles
                continue;
            }
            if let Some(successor) = later {
                successors.push(ExistenceSuccessorMsg {
                    swap: request.swap,
                    edge: value,
                    successor,
                })?;
            }
            later = Some(request.swap);
        }
        let Some(earliest) = later else {
            return Err(EmsError::Sort(ErrorInfo::new(
                "stream-desync",
                "peeked request group yielded no items",
            )));
        };
        infos.push(ExistenceInfoMsg {
            swap: earliest,
            edge: value,
            exists,
        })?;
    }

    Ok(ExistenceTables {
        infos: infos.finalize()?,
        successors: successors.finalize()?,
    })
}

fn foreign_slot(swap_id: SwapId, slot: SlotId) -> EmsError {
    EmsError::Structure(
        ErrorInfo::new("foreign-slot", "message addressed to a slot the swap does not touch")
            .with_context("swap", swap_id.as_raw().to_string())
            .with_context("slot", slot.as_raw().to_string()),
    )
}

pub(crate) fn orphan_message(phase: &str) -> EmsError {
    EmsError::Structure(
        ErrorInfo::new("orphan-message", "message addressed past the end of the run")
            .with_context("phase", phase.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_core::NodeId;

    fn edge(a: u64, b: u64) -> Edge {
        Edge::new(NodeId::from_raw(a), NodeId::from_raw(b))
    }

    fn request(value: Edge, swap: u64, forward_only: bool) -> ExistenceRequestMsg {
        ExistenceRequestMsg {
            edge: value,
            swap: SwapId::from_raw(swap),
            forward_only,
        }
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
    fn earliest_requester_gets_static_answer_and_chain_links_forward() {
        let edges = EdgeList::from_pairs([(1, 2), (3, 4)]);
        let config = SorterConfig::default();
        let mut sorter = Sorter::new(&config);
        // three swaps ask about (1,2); one asks about (7,8)
        sorter.push(request(edge(1, 2), 5, false)).unwrap();
        sorter.push(request(edge(1, 2), 2, true)).unwrap();
        sorter.push(request(edge(1, 2), 9, false)).unwrap();
        sorter.push(request(edge(7, 8), 4, false)).unwrap();
        let requests = sorter.finalize().unwrap();

        let tables = resolve_requests(&edges, &requests, &config).unwrap();

        let infos = drain(&tables.infos);
        assert_eq!(
            infos,
            vec![
                ExistenceInfoMsg {
                    swap: SwapId::from_raw(2),
                    edge: edge(1, 2),
                    exists: true,
                },
                ExistenceInfoMsg {
                    swap: SwapId::from_raw(4),
                    edge: edge(7, 8),
                    exists: false,
                },
            ]
        );

        let successors = drain(&tables.successors);
        assert_eq!(
            successors,
            vec![
                ExistenceSuccessorMsg {
                    swap: SwapId::from_raw(2),
                    edge: edge(1, 2),
                    successor: SwapId::from_raw(5),
                },
                ExistenceSuccessorMsg {
                    swap: SwapId::from_raw(5),
                    edge: edge(1, 2),
                    successor: SwapId::from_raw(9),
                },
            ]
        );
    }

    #[test]
    fn dual_role_requests_from_one_swap_collapse() {
        let edges = EdgeList::from_pairs([(1, 2)]);
        let config = SorterConfig::default();
        let mut sorter = Sorter::new(&config);
        sorter.push(request(edge(1, 2), 3, false)).unwrap();
        sorter.push(request(edge(1, 2), 3, true)).unwrap();
        let requests = sorter.finalize().unwrap();

        let tables = resolve_requests(&edges, &requests, &config).unwrap();
        assert_eq!(tables.successors.len(), 0);
        let infos = drain(&tables.infos);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].swap, SwapId::from_raw(3));
        assert!(infos[0].exists);
    }
}
