//! Read filtering primitives used by the region counter.
//!
//! This module exposes the [`ReadFilter`] trait along with [`CountReadFilter`],
//! the mapping-quality / flag / overlap / tag filter applied to every read
//! fetched for a region.

use smartstring::alias::String as CompactString;

use crate::core::record::AlignedRead;
use crate::pipeline::count::region::Region;

/// A trait for filtering reads against the region they were fetched for.
///
/// Implementations return `true` if the read passes the filter.
pub trait ReadFilter {
    fn filter_read<R: AlignedRead>(&self, read: &R, region: &Region) -> bool;
}

/// Tags extracted from a read that passed filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedRead {
    pub barcode: Option<CompactString>,
    pub umi: Option<CompactString>,
}

/// Filter thresholds for counting reads in a region.
#[derive(Debug, Clone)]
pub struct CountReadFilter {
    /// Reads below this mapping quality are rejected.
    pub min_mapq: u8,
    /// Reads whose flag value exceeds this ceiling are rejected.
    pub max_flag: u16,
    /// When non-zero, at least one of these bits must be set.
    pub incl_flag: u16,
    /// Reads carrying any of these bits are rejected.
    pub excl_flag: u16,
    /// Minimum number of aligned bases inside the region.
    pub min_len: u64,
    /// Tag that must be present and holds the cell barcode.
    pub cell_tag: Option<[u8; 2]>,
    /// Tag that must be present and holds the UMI.
    pub umi_tag: Option<[u8; 2]>,
}

impl Default for CountReadFilter {
    fn default() -> Self {
        Self {
            min_mapq: 20,
            max_flag: 255,
            incl_flag: 0,
            excl_flag: 0,
            min_len: 30,
            cell_tag: Some(*b"CB"),
            umi_tag: Some(*b"UB"),
        }
    }
}

impl CountReadFilter {
    #[inline]
    fn passes_flags(&self, flag: u16) -> bool {
        flag <= self.max_flag
            && (self.incl_flag == 0 || flag & self.incl_flag != 0)
            && flag & self.excl_flag == 0
    }

    /// Apply every check and return the read's tags when it is accepted.
    ///
    /// Each tag is looked up exactly once.
    pub fn accept<R: AlignedRead>(&self, read: &R, region: &Region) -> Option<AcceptedRead> {
        if read.mapping_quality() < self.min_mapq || !self.passes_flags(read.flag()) {
            return None;
        }

        let (start0, end0) = region.zero_based_inclusive();
        if read.overlap_len(start0, end0) < self.min_len {
            return None;
        }

        let barcode = match &self.cell_tag {
            Some(tag) => Some(read.tag_value(tag)?),
            None => None,
        };
        let umi = match &self.umi_tag {
            Some(tag) => Some(read.tag_value(tag)?),
            None => None,
        };

        Some(AcceptedRead { barcode, umi })
    }
}

impl ReadFilter for CountReadFilter {
    #[inline(always)]
    fn filter_read<R: AlignedRead>(&self, read: &R, region: &Region) -> bool {
        self.accept(read, region).is_some()
    }
}
