//! Per-region counting: fetch, filter, deduplicate, match barcodes.

use std::sync::Arc;

use serde::Serialize;

use crate::core::error::{FeatCountError, Result};
use crate::core::read_filter::CountReadFilter;
use crate::engine::par_regions::{FailurePolicy, RegionProcessor};
use crate::pipeline::count::barcode::BarcodeIndex;
use crate::pipeline::count::region::Region;
use crate::pipeline::count::source::{resolve_reference, AlignmentSource};
use crate::pipeline::count::tally::tally;

/// One non-zero cell of the region × barcode matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub region_index: usize,
    pub barcode_index: u32,
    pub count: u32,
}

/// Configuration for a counting run.
#[derive(Debug, Clone)]
pub struct CountConfig {
    /// Tag name for cell barcode; `None` disables barcode extraction.
    pub cell_tag: Option<String>,
    /// Tag name for UMI; `None` counts reads instead of molecules.
    pub umi_tag: Option<String>,
    /// Minimum mapping quality for a read to be considered
    pub min_mapq: u8,
    /// Reads with a flag value above this ceiling are skipped
    pub max_flag: u16,
    /// Required flag bits (any); 0 disables
    pub incl_flag: u16,
    /// Forbidden flag bits (any)
    pub excl_flag: u16,
    /// Minimum aligned length inside the region
    pub min_len: u64,
    /// Worker threads
    pub threads: usize,
    /// Stop at the first failing region instead of finishing the others
    pub fail_fast: bool,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            cell_tag: Some("CB".to_string()),
            umi_tag: Some("UB".to_string()),
            min_mapq: 20,
            max_flag: 255,
            incl_flag: 0,
            excl_flag: 0,
            min_len: 30,
            threads: 1,
            fail_fast: false,
        }
    }
}

/// Interpret a tag option: `None` disables it, `Auto` selects `auto_default`.
pub fn parse_tag_option(raw: &str, auto_default: Option<&str>) -> Option<String> {
    match raw.trim() {
        value if value.eq_ignore_ascii_case("none") => None,
        value if value.eq_ignore_ascii_case("auto") => auto_default.map(str::to_string),
        value => Some(value.to_string()),
    }
}

fn tag_bytes(name: &str, tag: &Option<String>) -> Result<Option<[u8; 2]>> {
    match tag {
        None => Ok(None),
        Some(value) => {
            let bytes = value.as_bytes();
            if bytes.len() == 2 && bytes.iter().all(u8::is_ascii_alphanumeric) {
                Ok(Some([bytes[0], bytes[1]]))
            } else {
                Err(FeatCountError::Config(format!(
                    "{} '{}' must be two alphanumeric characters",
                    name, value
                )))
            }
        }
    }
}

impl CountConfig {
    /// Reject thread counts of zero and malformed tag names.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(FeatCountError::Config("threads must be at least 1".to_string()));
        }
        tag_bytes("cell tag", &self.cell_tag)?;
        tag_bytes("UMI tag", &self.umi_tag)?;
        Ok(())
    }

    /// Build the read filter for a validated configuration.
    pub fn read_filter(&self) -> Result<CountReadFilter> {
        self.validate()?;
        Ok(CountReadFilter {
            min_mapq: self.min_mapq,
            max_flag: self.max_flag,
            incl_flag: self.incl_flag,
            excl_flag: self.excl_flag,
            min_len: self.min_len,
            cell_tag: tag_bytes("cell tag", &self.cell_tag)?,
            umi_tag: tag_bytes("UMI tag", &self.umi_tag)?,
        })
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::AtEnd
        }
    }
}

/// Count reads (or molecules) per whitelisted barcode for one region.
///
/// A region without matching barcodes yields an empty vector. Entries follow
/// the order in which barcodes were first seen in the region.
pub fn count_region<S: AlignmentSource>(
    source: &mut S,
    region_index: usize,
    region: &Region,
    barcodes: &BarcodeIndex,
    filter: &CountReadFilter,
) -> Result<Vec<CountEntry>> {
    let chrom = resolve_reference(source, region.chrom())
        .ok_or_else(|| FeatCountError::ReferenceNotFound(region.chrom().to_string()))?;

    let mut accepted = Vec::new();
    source.fetch(&chrom, region.start() - 1, region.stop(), |read| {
        if let Some(read) = filter.accept(read, region) {
            accepted.push(read);
        }
    })?;

    let counts = tally(accepted, filter.umi_tag.is_some());
    if counts.is_empty() {
        return Ok(Vec::new());
    }

    let matches = barcodes.match_batch(&counts.barcodes);
    Ok(matches
        .into_iter()
        .zip(counts.counts)
        .filter_map(|(matched, count)| {
            matched.map(|barcode_index| CountEntry {
                region_index,
                barcode_index,
                count,
            })
        })
        .collect())
}

/// [`RegionProcessor`] that runs [`count_region`] with a shared whitelist.
pub struct RegionCounter {
    barcodes: Arc<BarcodeIndex>,
    filter: CountReadFilter,
}

impl RegionCounter {
    pub fn new(barcodes: Arc<BarcodeIndex>, filter: CountReadFilter) -> Self {
        Self { barcodes, filter }
    }
}

impl RegionProcessor for RegionCounter {
    type P = CountEntry;

    fn process_region<S: AlignmentSource>(
        &self,
        source: &mut S,
        index: usize,
        region: &Region,
    ) -> Result<Vec<Self::P>> {
        count_region(source, index, region, &self.barcodes, &self.filter)
    }
}
