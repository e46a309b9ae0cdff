use serde::Serialize;

use crate::core::error::{FeatCountError, Result};
use crate::pipeline::count::region::Region;
use crate::pipeline::count::source::AlignmentSource;

/// Completed regions each worker may have queued ahead of the consumer.
/// Default in-flight window and channel capacity is `threads * REGIONS_IN_FLIGHT_PER_THREAD`.
pub const REGIONS_IN_FLIGHT_PER_THREAD: usize = 64;

/// Trait defining how a single region is processed.
pub trait RegionProcessor {
    /// The type returned when processing a region.
    type P: 'static + Send + Sync + Serialize;

    /// Process `region`, the `index`-th entry of the run, using a source
    /// handle owned by the calling worker.
    fn process_region<S: AlignmentSource>(
        &self,
        source: &mut S,
        index: usize,
        region: &Region,
    ) -> Result<Vec<Self::P>>;
}

/// What the driver does when a region fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Finish every other region, then fail the run.
    #[default]
    AtEnd,
    /// Stop issuing new regions after the first failure.
    FailFast,
}

/// A region that could not be processed.
#[derive(Debug)]
pub struct RegionFailure {
    pub index: usize,
    pub region_id: String,
    pub error: FeatCountError,
}

/// Totals of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub regions: usize,
    pub items: usize,
}
