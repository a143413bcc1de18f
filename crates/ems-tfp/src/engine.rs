//! Batch orchestration: bounded runs of the five-phase pipeline.

use ems_core::{EmsError, SwapDescriptor, SwapResult};
use ems_extsort::SorterConfig;
use serde::{Deserialize, Serialize};

use crate::edge_list::EdgeList;
use crate::{execute, existence, gather};

/// Parameters governing a swap batch; threaded through the engine explicitly
/// instead of living in process-wide singletons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfpConfig {
    /// Number of swaps processed per run. The edge array is fully updated
    /// between runs, so memory use scales with this value, not the graph.
    #[serde(default = "default_run_size")]
    pub run_size: usize,
    /// External sorter parameters shared by all pipeline streams.
    #[serde(default)]
    pub sorter: SorterConfig,
    /// Whether to keep the per-swap trace; disable for pure randomization.
    #[serde(default = "default_record_trace")]
    pub record_trace: bool,
}

fn default_run_size() -> usize {
    1 << 20
}

fn default_record_trace() -> bool {
    true
}

impl Default for TfpConfig {
    fn default() -> Self {
        Self {
            run_size: default_run_size(),
            sorter: SorterConfig::default(),
            record_trace: default_record_trace(),
        }
    }
}

/// Counters accumulated across all runs of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Swaps processed, performed or not.
    pub processed: u64,
    /// Swaps committed to the edge array.
    pub performed: u64,
    /// Swaps rejected (at least in part) because a candidate was a self-loop.
    pub loops: u64,
    /// Swaps with at least one duplicate-edge conflict.
    pub conflicts: u64,
    /// Number of bounded runs the batch was split into.
    pub runs: u64,
}

/// Outcome of a batch: one trace entry per requested swap plus counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Per-swap traces in request order; empty when tracing is disabled.
    pub results: Vec<SwapResult>,
    /// Aggregate counters.
    pub stats: RunStats,
}

/// Applies ordered double-edge-swap batches to an edge array it exclusively
/// borrows.
///
/// Swap ids are assigned from stream position: the i-th descriptor of the
/// batch has logical time i. Within each bounded run the pipeline executes
/// its phases strictly in order — gather, chain building, request
/// generation, resolution, execution, update application — and every phase is
/// a single forward sweep over sorted streams.
pub struct EdgeSwapTfp<'a> {
    edges: &'a mut EdgeList,
    config: TfpConfig,
}

impl<'a> EdgeSwapTfp<'a> {
    /// Creates an engine over the given edge array.
    pub fn new(edges: &'a mut EdgeList, config: &TfpConfig) -> Self {
        Self {
            edges,
            config: config.clone(),
        }
    }

    /// Processes a full batch of swap requests, mutating the edge array in
    /// place. Runs are not independent: the next run's existence answers
    /// depend on the updates of the previous one, so the array is rewritten
    /// between runs.
    pub fn run(&mut self, swaps: &[SwapDescriptor]) -> Result<RunReport, EmsError> {
        let run_size = self.config.run_size.max(1);
        let mut stats = RunStats::default();
        let mut results = Vec::new();

        for (run_index, chunk) in swaps.chunks(run_size).enumerate() {
            let first_swap_id = (run_index * run_size) as u64;
            let chains = gather::build_dependency_chains(
                self.edges,
                chunk,
                first_swap_id,
                &self.config.sorter,
            )?;
            let requests =
                existence::generate_requests(chunk, first_swap_id, &chains, &self.config.sorter)?;
            let tables = existence::resolve_requests(self.edges, &requests, &self.config.sorter)?;
            let output = execute::perform_swaps(
                chunk,
                first_swap_id,
                &chains,
                &tables,
                &self.config.sorter,
                &mut stats,
                self.config.record_trace,
            )?;
            self.edges.apply_updates(&output.updates)?;
            results.extend(output.results);
            stats.runs += 1;
        }

        Ok(RunReport { results, stats })
    }
}
