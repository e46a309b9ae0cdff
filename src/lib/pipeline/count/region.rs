//! Genomic regions and the adapters that produce them.
//!
//! All [`Region`]s are 1-based and inclusive on both ends. BED input is
//! 0-based half-open and converted on read.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::debug;

use crate::core::error::{FeatCountError, Result};
use crate::core::fs::open_text;
use crate::pipeline::count::source::{resolve_reference, AlignmentSource};

/// A genomic interval with an output label.
///
/// Fields are private so every region satisfies `1 <= start <= stop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    chrom: String,
    start: u64,
    stop: u64,
    id: String,
}

impl Region {
    pub fn new<C: Into<String>, I: Into<String>>(
        chrom: C,
        start: u64,
        stop: u64,
        id: I,
    ) -> Result<Self> {
        let chrom = chrom.into();
        if start == 0 || start > stop {
            return Err(FeatCountError::InvalidInput(format!(
                "Region {}:{}-{} must satisfy 1 <= start <= stop",
                chrom, start, stop
            )));
        }
        Ok(Self {
            chrom,
            start,
            stop,
            id: id.into(),
        })
    }

    /// Region labelled `chrom:start-stop`.
    pub fn with_locus_id<C: Into<String>>(chrom: C, start: u64, stop: u64) -> Result<Self> {
        let chrom = chrom.into();
        let id = format!("{}:{}-{}", chrom, start, stop);
        Self::new(chrom, start, stop, id)
    }

    #[inline]
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    /// 1-based, inclusive.
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// 1-based, inclusive.
    #[inline]
    pub fn stop(&self) -> u64 {
        self.stop
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of reference bases covered.
    #[inline]
    pub fn width(&self) -> u64 {
        self.stop - self.start + 1
    }

    /// `(start - 1, stop - 1)`, the 0-based inclusive window used for overlap counting.
    #[inline]
    pub fn zero_based_inclusive(&self) -> (i64, i64) {
        (self.start as i64 - 1, self.stop as i64 - 1)
    }

    /// Read all regions from a BED file (plain or gzip).
    ///
    /// Blank lines and `#` comments are skipped. Any malformed record aborts
    /// parsing with an error naming its 1-based line number.
    pub fn from_bed<P: AsRef<Path>>(path: P) -> Result<Vec<Region>> {
        let path = path.as_ref();
        let reader = open_text(path)?;
        let regions = parse_bed(reader, path)?;
        debug!("Loaded {} regions from {}", regions.len(), path.display());
        Ok(regions)
    }

    /// Split a chromosome of the alignment source into fixed-size bins.
    ///
    /// The chromosome name is resolved with and without a `chr` prefix.
    pub fn from_chromosome_bins<S: AlignmentSource>(
        source: &S,
        chrom: &str,
        bin_size: u64,
    ) -> Result<Vec<Region>> {
        let resolved = resolve_reference(source, chrom)
            .ok_or_else(|| FeatCountError::ReferenceNotFound(chrom.to_string()))?;
        let length = source
            .reference_length(&resolved)
            .ok_or_else(|| FeatCountError::ReferenceNotFound(resolved.clone()))?;
        bin_chromosome(&resolved, length, bin_size)
    }

    /// One region per gene, labelled with the gene id.
    pub fn from_genes(genes: &[Gene]) -> Result<Vec<Region>> {
        genes
            .iter()
            .map(|gene| Region::new(gene.chrom.as_str(), gene.start, gene.stop, gene.gene_id.as_str()))
            .collect()
    }
}

/// Divide `[1, reference_length]` into windows of `bin_size`, truncating the last.
pub fn bin_chromosome(chrom: &str, reference_length: u64, bin_size: u64) -> Result<Vec<Region>> {
    if bin_size == 0 {
        return Err(FeatCountError::InvalidInput(
            "Bin size must be greater than zero".to_string(),
        ));
    }
    if reference_length == 0 {
        return Err(FeatCountError::InvalidInput(format!(
            "Reference '{}' has zero length",
            chrom
        )));
    }

    let nbins = reference_length.div_ceil(bin_size);
    let mut regions = Vec::with_capacity(nbins as usize);
    for i in 0..nbins {
        let start = i * bin_size + 1;
        let stop = ((i + 1) * bin_size).min(reference_length);
        regions.push(Region::with_locus_id(chrom, start, stop)?);
    }
    Ok(regions)
}

fn parse_bed<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Region>> {
    let mut regions = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.split('\t');
        let chrom = fields.next().unwrap_or_default();
        if chrom.is_empty() {
            return Err(FeatCountError::parse(path, line_no, "missing chromosome"));
        }
        let start0: u64 = parse_field(fields.next(), "start", path, line_no)?;
        let stop: u64 = parse_field(fields.next(), "stop", path, line_no)?;
        if stop <= start0 {
            return Err(FeatCountError::parse(
                path,
                line_no,
                format!("stop {} is not greater than start {}", stop, start0),
            ));
        }
        regions.push(Region::with_locus_id(chrom, start0 + 1, stop)?);
    }
    Ok(regions)
}

fn parse_field(field: Option<&str>, name: &str, path: &Path, line: usize) -> Result<u64> {
    let raw = field.ok_or_else(|| FeatCountError::parse(path, line, format!("missing {}", name)))?;
    raw.trim().parse().map_err(|_| {
        FeatCountError::parse(path, line, format!("invalid {} '{}'", name, raw))
    })
}

/// An annotated gene, 1-based inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub gene_id: String,
    pub chrom: String,
    pub start: u64,
    pub stop: u64,
}

/// Read a tab-separated `chrom  start  stop  gene_id` table (1-based, inclusive).
pub fn read_gene_table<P: AsRef<Path>>(path: P) -> Result<Vec<Gene>> {
    let path = path.as_ref();
    let reader = open_text(path)?;
    let mut genes = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let chrom = fields.next().unwrap_or_default().to_string();
        let start = parse_field(fields.next(), "start", path, line_no)?;
        let stop = parse_field(fields.next(), "stop", path, line_no)?;
        let gene_id = match fields.next().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(FeatCountError::parse(path, line_no, "missing gene id")),
        };
        if start == 0 || start > stop {
            return Err(FeatCountError::parse(
                path,
                line_no,
                format!("invalid interval {}-{}", start, stop),
            ));
        }
        genes.push(Gene {
            gene_id,
            chrom,
            start,
            stop,
        });
    }
    Ok(genes)
}

/// Where the regions of a run come from.
#[derive(Debug, Clone)]
pub enum RegionSource {
    Bed(PathBuf),
    Genes(PathBuf),
    /// Fixed-size bins over the named chromosomes.
    Bins { chroms: Vec<String>, bin_size: u64 },
}

impl RegionSource {
    /// Materialise the region list. Bins need the alignment source header.
    pub fn load<S: AlignmentSource>(&self, source: &S) -> Result<Vec<Region>> {
        match self {
            RegionSource::Bed(path) => Region::from_bed(path),
            RegionSource::Genes(path) => Region::from_genes(&read_gene_table(path)?),
            RegionSource::Bins { chroms, bin_size } => {
                let mut regions = Vec::new();
                for chrom in chroms {
                    regions.extend(Region::from_chromosome_bins(source, chrom, *bin_size)?);
                }
                Ok(regions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::count::source::MemorySource;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn single_bed_line_becomes_one_based_region() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "one.bed", "chr1\t999\t1999\n");
        let regions = Region::from_bed(&path).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].chrom(), "chr1");
        assert_eq!(regions[0].start(), 1000);
        assert_eq!(regions[0].stop(), 1999);
        assert_eq!(regions[0].id(), "chr1:1000-1999");
    }

    #[test]
    fn bed_extra_columns_and_blank_lines_are_ignored() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "extra.bed",
            "# header\nchr1\t0\t10\tname\t0\t+\n\nchr2\t5\t6\n",
        );
        let regions = Region::from_bed(&path).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].id(), "chr2:6-6");
    }

    #[test]
    fn malformed_bed_line_reports_line_number() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "bad.bed", "chr1\t0\t10\nchr1\tabc\t20\n");
        match Region::from_bed(&path) {
            Err(FeatCountError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }

        let path = write_file(dir.path(), "short.bed", "chr1\t5\n");
        assert!(matches!(
            Region::from_bed(&path),
            Err(FeatCountError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn bins_truncate_last_window() {
        let bins = bin_chromosome("chr1", 25, 10).unwrap();
        let ids: Vec<_> = bins.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["chr1:1-10", "chr1:11-20", "chr1:21-25"]);
        assert!(bin_chromosome("chr1", 25, 0).is_err());
        assert!(bin_chromosome("chr1", 0, 10).is_err());
    }

    #[test]
    fn bins_resolve_chr_prefix() {
        let source = MemorySource::new().with_reference("1", 15);
        let bins = Region::from_chromosome_bins(&source, "chr1", 10).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].chrom(), "1");
        assert!(matches!(
            Region::from_chromosome_bins(&source, "chr2", 10),
            Err(FeatCountError::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn genes_keep_their_identifiers() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "genes.tsv", "chr1\t100\t200\tGENE1\n");
        let genes = read_gene_table(&path).unwrap();
        let regions = Region::from_genes(&genes).unwrap();
        assert_eq!(regions[0].id(), "GENE1");
        assert_eq!((regions[0].start(), regions[0].stop()), (100, 200));
    }

    #[test]
    fn genes_with_invalid_coordinates_are_rejected() {
        let gene = |start, stop| Gene {
            gene_id: "G".to_string(),
            chrom: "chr1".to_string(),
            start,
            stop,
        };
        assert!(matches!(
            Region::from_genes(&[gene(10, 20), gene(0, 20)]),
            Err(FeatCountError::InvalidInput(_))
        ));
        assert!(matches!(
            Region::from_genes(&[gene(30, 20)]),
            Err(FeatCountError::InvalidInput(_))
        ));
    }

    proptest! {
        #[test]
        fn bins_partition_reference(len in 1u64..50_000, bin in 1u64..5_000) {
            let bins = bin_chromosome("chrX", len, bin).unwrap();
            prop_assert_eq!(bins.len() as u64, len.div_ceil(bin));
            let mut expected_start = 1;
            for region in &bins {
                prop_assert_eq!(region.start(), expected_start);
                prop_assert!(region.width() <= bin);
                expected_start = region.stop() + 1;
            }
            prop_assert_eq!(expected_start, len + 1);
        }

        #[test]
        fn bed_round_trips_line_count(
            records in prop::collection::vec((0u64..1_000_000, 1u64..10_000), 0..50)
        ) {
            let dir = tempdir().unwrap();
            let content: String = records
                .iter()
                .map(|(start0, width)| format!("chr7\t{}\t{}\n", start0, start0 + width))
                .collect();
            let path = write_file(dir.path(), "prop.bed", &content);
            let regions = Region::from_bed(&path).unwrap();
            prop_assert_eq!(regions.len(), records.len());
            for (region, (start0, width)) in regions.iter().zip(records.iter()) {
                prop_assert_eq!(region.start(), start0 + 1);
                prop_assert_eq!(region.stop(), start0 + width);
                prop_assert_eq!(region.id(), format!("chr7:{}-{}", start0 + 1, start0 + width));
            }
        }
    }
}
