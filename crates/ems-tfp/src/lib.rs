#![deny(missing_docs)]

//! Degree-preserving randomization of huge graphs via double-edge swaps,
//! organized as a time-forward-processing pipeline over sorted streams.
//!
//! The engine applies a strictly ordered batch of swap requests to an
//! externally stored edge array. Each swap exchanges endpoints between two
//! edge slots, and is committed only if neither candidate edge is a self-loop
//! and neither would duplicate an edge present elsewhere in the graph at that
//! swap's logical time. The engine never decides *which* swaps to attempt;
//! the request stream comes from a collaborator.
//!
//! No phase performs random-access reads into the edge array. Every
//! cross-reference — "what does this slot hold as of swap S", "does this edge
//! value exist just before swap S" — is realized through external sorts and
//! linear merge sweeps, so memory use is bounded by the configured run size
//! rather than the graph size.

mod edge_list;
mod engine;
mod execute;
mod existence;
mod gather;
mod messages;

pub use edge_list::EdgeList;
pub use engine::{EdgeSwapTfp, RunReport, RunStats, TfpConfig};
