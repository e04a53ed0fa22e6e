//! Per-participant aggregation and root-side collection.
//!
//! Every participant sums its share of the distributed readings into one
//! [`types::LocalAccumulator`] per timestamp group. The root combines the
//! gathered tallies according to the run's [`types::WorkSplit`] and ranks
//! the signals of each group.

pub mod local;
pub mod rank;
pub mod types;

pub use local::aggregate_local;
pub use rank::{DEFAULT_TOP_N, collect, combine, rank_accumulator, rank_groups};
pub use types::{LocalAccumulator, LocalTally, RankedEntry, TimestampRanking, WorkSplit};
