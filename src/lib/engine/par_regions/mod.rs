//! Parallel genomic region processing.
//!
//! The [`ParRegions`] executor fans regions out across a Rayon pool, one
//! region per task so idle workers steal from busy ones, and streams each
//! region's results back through a bounded crossbeam channel. Callers
//! implement [`RegionProcessor`] to define per-region work and receive the
//! results in input order.

mod replay;
mod scheduler;
mod types;

pub use scheduler::ParRegions;
pub use types::{
    FailurePolicy, RegionFailure, RegionProcessor, RunSummary, REGIONS_IN_FLIGHT_PER_THREAD,
};
