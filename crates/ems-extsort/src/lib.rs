#![deny(missing_docs)]

//! Bounded-memory external sorting for the EMS edge-swap engine.
//!
//! Every cross-reference inside the swap pipeline is realized as a sort plus a
//! linear merge, so the whole engine rests on two primitives provided here:
//!
//! - [`Sorter`], which accepts an unbounded record stream while holding at most
//!   a configured number of records in memory, spilling sorted runs to
//!   temporary storage, and
//! - [`MergeStream`] / [`PushMerge`], forward-only merge cursors over the
//!   finalized runs. [`PushMerge`] additionally accepts records pushed for
//!   later keys while draining, which is the time-forward-processing pattern
//!   used to walk dependency chains without random access.

mod merge;
mod sorter;

pub use merge::{MergeStream, PushMerge};
pub use sorter::{SortedRun, Sorter, SorterConfig};
