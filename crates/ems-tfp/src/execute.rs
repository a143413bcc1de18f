//! Swap execution: the single sweep that decides and commits every swap.
//!
//! By the time this phase runs, every fact a swap needs has been routed to it:
//! the actual values of its two slots (seeded or forwarded along dependency
//! chains) and the existence state of every value it might query (seeded or
//! forwarded along per-value notification chains). The sweep processes swaps
//! in ascending logical time, so forwarded messages always target the future.

use ems_core::{Edge, EmsError, ErrorInfo, SwapDescriptor, SwapId, SwapResult};
use ems_extsort::{PushMerge, SortedRun, Sorter, SorterConfig};

use crate::engine::RunStats;
use crate::existence::{collect_successors, orphan_message, ExistenceTables};
use crate::gather::DependencyChains;
use crate::messages::{side_of, DependencyChainEdgeMsg, EdgeUpdate, ExistenceInfoMsg};

/// Trace and final slot values produced by one run.
pub(crate) struct ExecutionOutput {
    /// Per-swap traces, in request order; empty when tracing is disabled.
    pub results: Vec<SwapResult>,
    /// Final value of every touched slot, keyed by slot id.
    pub updates: SortedRun<EdgeUpdate>,
}

/// Commits conflict-free swaps and propagates post-state along both chain
/// families.
pub(crate) fn perform_swaps(
    swaps: &[SwapDescriptor],
    first_swap_id: u64,
    chains: &DependencyChains,
    tables: &ExistenceTables,
    config: &SorterConfig,
    stats: &mut RunStats,
    record_trace: bool,
) -> Result<ExecutionOutput, EmsError> {
    let mut values = PushMerge::new(chains.seeds.stream()?);
    let mut dep_successors = chains.successors.stream()?;
    let mut infos = PushMerge::new(tables.infos.stream()?);
    let mut ex_successors = tables.successors.stream()?;
    let mut updates = Sorter::new(config);
    let mut results = Vec::with_capacity(if record_trace { swaps.len() } else { 0 });

    for (offset, swap) in swaps.iter().enumerate() {
        let swap_id = SwapId::from_raw(first_swap_id + offset as u64);

        let (a, b) = resolve_actual_values(&mut values, swap, swap_id)?;
        let known = collect_known_facts(&mut infos, swap_id)?;

        let (c0, c1) = Edge::recombine(a, b, swap.direction);
        let loop_detected = c0.is_loop() || c1.is_loop();
        let conflict = [
            conflict_flag(c0, a, b, &known, swap_id)?,
            conflict_flag(c1, a, b, &known, swap_id)?,
        ];
        let performed = !loop_detected && !conflict[0] && !conflict[1];

        stats.processed += 1;
        if loop_detected {
            stats.loops += 1;
        }
        if conflict[0] || conflict[1] {
            stats.conflicts += 1;
        }
        if performed {
            stats.performed += 1;
        }
        if record_trace {
            let mut result = SwapResult {
                edges: [c0, c1],
                loop_detected,
                conflict,
                performed,
            };
            result.normalize();
            results.push(result);
        }

        let post = if performed { [c0, c1] } else { [a, b] };

        // dependency chains: hand the value to the next toucher, or emit the
        // slot's final value at the chain's end
        let next_on = collect_successors(&mut dep_successors, swap, swap_id)?;
        for side in 0..2 {
            match next_on[side] {
                Some(successor) => values.push(DependencyChainEdgeMsg {
                    swap: successor,
                    slot: swap.slots[side],
                    edge: post[side],
                }),
                None => updates.push(EdgeUpdate {
                    slot: swap.slots[side],
                    edge: post[side],
                })?,
            }
        }

        // existence chains: forward post-state, reflecting only what actually
        // happened — a rejected swap contributes no phantom facts
        while ex_successors.peek().map_or(false, |msg| msg.swap == swap_id) {
            let Some(msg) = ex_successors.next_item()? else {
                break;
            };
            let before = lookup(&known, msg.edge).ok_or_else(|| {
                EmsError::Structure(
                    ErrorInfo::new("missing-fact", "swap lacks the fact it must forward")
                        .with_context("swap", swap_id.as_raw().to_string()),
                )
            })?;
            let after = if !performed {
                before
            } else if msg.edge == c0 || msg.edge == c1 {
                true
            } else if msg.edge == a || msg.edge == b {
                false
            } else {
                before
            };
            infos.push(ExistenceInfoMsg {
                swap: msg.successor,
                edge: msg.edge,
                exists: after,
            });
        }
    }

    if values.peek().is_some()
        || infos.peek().is_some()
        || dep_successors.peek().is_some()
        || ex_successors.peek().is_some()
    {
        return Err(orphan_message("execute"));
    }

    Ok(ExecutionOutput {
        results,
        updates: updates.finalize()?,
    })
}

/// Resolves the one actual value per slot for `swap_id`.
fn resolve_actual_values(
    values: &mut PushMerge<'_, DependencyChainEdgeMsg>,
    swap: &SwapDescriptor,
    swap_id: SwapId,
) -> Result<(Edge, Edge), EmsError> {
    let mut actual: [Option<Edge>; 2] = [None, None];
    while values.peek().map_or(false, |msg| msg.swap == swap_id) {
        let Some(msg) = values.next_item()? else {
            break;
        };
        let side = side_of(swap, msg.slot).ok_or_else(|| {
            EmsError::Structure(
                ErrorInfo::new("foreign-slot", "value addressed to an untouched slot")
                    .with_context("swap", swap_id.as_raw().to_string())
                    .with_context("slot", msg.slot.as_raw().to_string()),
            )
        })?;
        if actual[side].is_some() {
            return Err(EmsError::Structure(
                ErrorInfo::new("ambiguous-chain-value", "slot resolved to two values")
                    .with_context("swap", swap_id.as_raw().to_string())
                    .with_context("slot", msg.slot.as_raw().to_string()),
            ));
        }
        actual[side] = Some(msg.edge);
    }
    match (actual[0], actual[1]) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EmsError::Structure(
            ErrorInfo::new("missing-chain-value", "no value reached a swap's slot")
                .with_context("swap", swap_id.as_raw().to_string()),
        )),
    }
}

/// Drains all existence facts addressed to `swap_id` into a sorted table.
fn collect_known_facts(
    infos: &mut PushMerge<'_, ExistenceInfoMsg>,
    swap_id: SwapId,
) -> Result<Vec<(Edge, bool)>, EmsError> {
    let mut known: Vec<(Edge, bool)> = Vec::new();
    while infos.peek().map_or(false, |msg| msg.swap == swap_id) {
        let Some(msg) = infos.next_item()? else {
            break;
        };
        match known.binary_search_by(|(edge, _)| edge.cmp(&msg.edge)) {
            Ok(pos) => {
                if known[pos].1 != msg.exists {
                    return Err(EmsError::Structure(
                        ErrorInfo::new("contradictory-fact", "two answers disagree for one value")
                            .with_context("swap", swap_id.as_raw().to_string()),
                    ));
                }
            }
            Err(pos) => known.insert(pos, (msg.edge, msg.exists)),
        }
    }
    Ok(known)
}

fn lookup(known: &[(Edge, bool)], value: Edge) -> Option<bool> {
    known
        .binary_search_by(|(edge, _)| edge.cmp(&value))
        .ok()
        .map(|pos| known[pos].1)
}

/// Duplicate-edge verdict for one candidate.
///
/// "Exists" means *occurs elsewhere*: the swap removes its own two values
/// before adding the candidates, so a candidate equal to either source value
/// is no conflict. A non-loop candidate with no answer on file is a violated
/// structural invariant, not a recoverable condition.
fn conflict_flag(
    candidate: Edge,
    a: Edge,
    b: Edge,
    known: &[(Edge, bool)],
    swap_id: SwapId,
) -> Result<bool, EmsError> {
    if candidate.is_loop() {
        return Ok(false);
    }
    if candidate == a || candidate == b {
        return Ok(false);
    }
    match lookup(known, candidate) {
        Some(exists) => Ok(exists),
        None => Err(EmsError::Structure(
            ErrorInfo::new("missing-answer", "existence query was never answered")
                .with_context("swap", swap_id.as_raw().to_string()),
        )),
    }
}
