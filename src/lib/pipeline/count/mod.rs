//! Per-region, per-barcode read and UMI counting.

pub mod barcode;
pub mod processor;
pub mod region;
pub mod source;
pub mod tally;

pub use barcode::BarcodeIndex;
pub use processor::{count_region, parse_tag_option, CountConfig, CountEntry, RegionCounter};
pub use region::{Gene, Region, RegionSource};
pub use source::{AlignmentSource, BamSource, BamSourceFactory, MemorySource, MultiSource, SourceFactory};
pub use tally::{tally, Tally};
