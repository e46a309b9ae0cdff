//! Read-level view used by the filters and the region counter.
//!
//! [`AlignedRead`] is the narrow surface the counting engine needs from an
//! alignment record. It is implemented for `rust_htslib` BAM records and for
//! the in-memory [`ReadRecord`].

use rust_htslib::bam::record::{Aux, Cigar, Record};
use smartstring::alias::String as CompactString;

/// Alignment properties consulted while counting.
pub trait AlignedRead {
    /// Mapping quality.
    fn mapping_quality(&self) -> u8;

    /// SAM flag bits.
    fn flag(&self) -> u16;

    /// Number of aligned reference positions within `[start0, end0]`
    /// (0-based, both ends inclusive).
    fn overlap_len(&self, start0: i64, end0: i64) -> u64;

    /// String value of an auxiliary tag, `None` when absent, empty or `-`.
    fn tag_value(&self, tag: &[u8]) -> Option<CompactString>;
}

#[inline]
fn clipped_len(block_start: i64, block_end: i64, start0: i64, end0: i64) -> u64 {
    let lo = block_start.max(start0);
    let hi = block_end.min(end0 + 1);
    if hi > lo {
        (hi - lo) as u64
    } else {
        0
    }
}

#[inline]
fn clean_tag(raw: &str) -> Option<CompactString> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        None
    } else {
        Some(CompactString::from(raw))
    }
}

impl AlignedRead for Record {
    #[inline]
    fn mapping_quality(&self) -> u8 {
        self.mapq()
    }

    #[inline]
    fn flag(&self) -> u16 {
        self.flags()
    }

    fn overlap_len(&self, start0: i64, end0: i64) -> u64 {
        let mut ref_pos = self.pos();
        let mut overlap = 0u64;
        for op in self.cigar().iter() {
            match *op {
                Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                    let block_end = ref_pos + len as i64;
                    overlap += clipped_len(ref_pos, block_end, start0, end0);
                    ref_pos = block_end;
                }
                Cigar::Del(len) | Cigar::RefSkip(len) => ref_pos += len as i64,
                Cigar::Ins(_) | Cigar::SoftClip(_) | Cigar::HardClip(_) | Cigar::Pad(_) => {}
            }
            if ref_pos > end0 {
                break;
            }
        }
        overlap
    }

    fn tag_value(&self, tag: &[u8]) -> Option<CompactString> {
        match self.aux(tag).ok()? {
            Aux::String(value) => clean_tag(value),
            Aux::Char(value) => clean_tag(&(value as char).to_string()),
            Aux::ArrayU8(values) => {
                let bytes: Vec<u8> = values.iter().collect();
                std::str::from_utf8(&bytes).ok().and_then(clean_tag)
            }
            _ => None,
        }
    }
}

/// An alignment held in memory, described by its aligned reference positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRecord {
    /// 0-based reference positions of aligned (M/=/X) bases, ascending.
    pub positions: Vec<i64>,
    pub mapq: u8,
    pub flag: u16,
    tags: Vec<([u8; 2], String)>,
}

impl ReadRecord {
    /// A read aligned to `len` consecutive reference bases starting at `start0`.
    pub fn contiguous(start0: i64, len: i64) -> Self {
        Self {
            positions: (start0..start0 + len).collect(),
            mapq: 60,
            ..Self::default()
        }
    }

    pub fn with_mapq(mut self, mapq: u8) -> Self {
        self.mapq = mapq;
        self
    }

    pub fn with_flag(mut self, flag: u16) -> Self {
        self.flag = flag;
        self
    }

    /// Attach an auxiliary string tag, replacing any previous value.
    pub fn with_tag(mut self, tag: &[u8; 2], value: &str) -> Self {
        self.tags.retain(|(t, _)| t != tag);
        self.tags.push((*tag, value.to_string()));
        self
    }

    /// First and last aligned reference positions.
    pub fn span(&self) -> Option<(i64, i64)> {
        Some((*self.positions.first()?, *self.positions.last()?))
    }
}

impl AlignedRead for ReadRecord {
    #[inline]
    fn mapping_quality(&self) -> u8 {
        self.mapq
    }

    #[inline]
    fn flag(&self) -> u16 {
        self.flag
    }

    fn overlap_len(&self, start0: i64, end0: i64) -> u64 {
        self.positions
            .iter()
            .filter(|&&pos| pos >= start0 && pos <= end0)
            .count() as u64
    }

    fn tag_value(&self, tag: &[u8]) -> Option<CompactString> {
        self.tags
            .iter()
            .find(|(t, _)| t.as_slice() == tag)
            .and_then(|(_, value)| clean_tag(value))
    }
}
