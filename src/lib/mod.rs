//! featcount: per-region, per-cell read and UMI counting
//!
//! Given indexed alignments, a cell barcode whitelist and a list of genomic
//! regions (BED records, genes or fixed-width chromosome bins), the library
//! counts for every region how many reads, or distinct UMIs, each
//! whitelisted barcode contributes. Regions are processed in parallel and
//! results are delivered in region order as sparse triplets.
//!
//! # Modules
//!
//! - [`core`]: errors, read filtering, alignment records and I/O helpers
//! - [`engine`]: the parallel region driver ([`engine::par_regions::ParRegions`])
//! - [`pipeline`]: region sources, barcode index, UMI tally and the region counter

pub mod core;
pub mod engine;
pub mod pipeline;

pub use crate::core::error::{FeatCountError, Result};
