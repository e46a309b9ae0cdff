use anyhow::{anyhow, bail, Result};
use featcount_lib::pipeline::count::{parse_tag_option, CountConfig, RegionSource};
use std::path::PathBuf;
use structopt::StructOpt;

use crate::commands::common::read_path_list;
use crate::commands::is_standard_contig;

/// Arguments for the `count` command.
#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "count", about = "Count reads or UMIs per region and cell barcode")]
pub struct CountArgs {
    /// Indexed BAM/CRAM file(s), comma separated. Reads from all files are pooled.
    #[structopt(short, long, parse(from_os_str), use_delimiter = true)]
    pub bam: Vec<PathBuf>,

    /// File listing one indexed BAM/CRAM path per line.
    #[structopt(long, parse(from_os_str))]
    pub bam_list: Option<PathBuf>,

    /// Path to reference FASTA file (required for CRAM files).
    #[structopt(long, short = "r", parse(from_os_str))]
    pub reference: Option<PathBuf>,

    /// Cell barcode whitelist, one barcode per line (plain or gzip).
    #[structopt(long, parse(from_os_str))]
    pub barcodes: PathBuf,

    /// BED file of regions (0-based, half-open).
    #[structopt(long, parse(from_os_str), conflicts_with_all = &["genes", "bin-size"])]
    pub bed: Option<PathBuf>,

    /// Gene table with columns chrom, start, stop, gene_id (1-based, inclusive).
    #[structopt(long, parse(from_os_str), conflicts_with = "bin-size")]
    pub genes: Option<PathBuf>,

    /// Width of chromosome bins in base pairs.
    #[structopt(long)]
    pub bin_size: Option<u64>,

    /// Chromosomes to bin, comma separated. Defaults to the canonical contigs in the header.
    #[structopt(long, use_delimiter = true, requires = "bin-size")]
    pub chroms: Vec<String>,

    /// Bin every contig in the header instead of the canonical chromosomes only.
    #[structopt(long = "allcontigs", short = "A")]
    pub all_contigs: bool,

    /// Output directory for regions.tsv, barcodes.tsv and counts.tsv.
    #[structopt(short, long, parse(from_os_str))]
    pub outdir: PathBuf,

    /// Cell barcode tag name.
    #[structopt(long, default_value = "CB")]
    pub cell_tag: String,

    /// UMI tag name; `None` counts reads, `Auto` means UB.
    #[structopt(long, default_value = "Auto")]
    pub umi_tag: String,

    /// Minimum mapping quality.
    #[structopt(long, short = "q", default_value = "20")]
    pub min_mapq: u8,

    /// Reads with a FLAG value above this are skipped.
    #[structopt(long, default_value = "255")]
    pub max_flag: u16,

    /// Keep only reads with at least one of these FLAG bits set (0 keeps all).
    #[structopt(long, default_value = "0")]
    pub incl_flag: u16,

    /// Skip reads with any of these FLAG bits set.
    #[structopt(long, default_value = "0")]
    pub excl_flag: u16,

    /// Minimum number of aligned bases inside the region.
    #[structopt(long, default_value = "30")]
    pub min_len: u64,

    /// Number of threads to use.
    #[structopt(short, long, default_value = "1")]
    pub threads: usize,

    /// Abort at the first failing region instead of finishing the others.
    #[structopt(long)]
    pub fail_fast: bool,

    /// Gzip the counts file.
    #[structopt(long)]
    pub gzip: bool,
}

impl CountArgs {
    /// Every alignment file named by `--bam` and `--bam-list`, in order.
    pub fn alignment_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = self.bam.clone();
        if let Some(list) = &self.bam_list {
            paths.extend(read_path_list(list)?);
        }
        if paths.is_empty() {
            bail!("No alignment files given; use --bam or --bam-list");
        }
        Ok(paths)
    }

    /// Translate the region flags into a [`RegionSource`].
    ///
    /// `header_contigs` supplies the chromosomes to bin when `--chroms` is absent.
    pub fn region_source(&self, header_contigs: &[String]) -> Result<RegionSource> {
        if let Some(bed) = &self.bed {
            return Ok(RegionSource::Bed(bed.clone()));
        }
        if let Some(genes) = &self.genes {
            return Ok(RegionSource::Genes(genes.clone()));
        }
        let bin_size = self
            .bin_size
            .ok_or_else(|| anyhow!("No regions given; use --bed, --genes or --bin-size"))?;

        let chroms = if self.chroms.is_empty() {
            header_contigs
                .iter()
                .filter(|name| self.all_contigs || is_standard_contig(name))
                .cloned()
                .collect::<Vec<_>>()
        } else {
            self.chroms.clone()
        };
        if chroms.is_empty() {
            bail!("No chromosomes left to bin; name them with --chroms or pass --allcontigs");
        }
        Ok(RegionSource::Bins { chroms, bin_size })
    }

    /// Counting options. A cell barcode tag is mandatory on the command line.
    pub fn count_config(&self) -> Result<CountConfig> {
        let cell_tag = parse_tag_option(&self.cell_tag, None)
            .ok_or_else(|| anyhow!("--cell-tag must name a tag; counting requires cell barcodes"))?;
        let config = CountConfig {
            cell_tag: Some(cell_tag),
            umi_tag: parse_tag_option(&self.umi_tag, Some("UB")),
            min_mapq: self.min_mapq,
            max_flag: self.max_flag,
            incl_flag: self.incl_flag,
            excl_flag: self.excl_flag,
            min_len: self.min_len,
            threads: self.threads,
            fail_fast: self.fail_fast,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> CountArgs {
        let mut argv = vec![
            "count",
            "--bam",
            "a.bam,b.bam",
            "--barcodes",
            "barcodes.tsv",
            "--outdir",
            "out",
        ];
        argv.extend_from_slice(extra);
        CountArgs::from_iter_safe(&argv).unwrap()
    }

    #[test]
    fn parses_minimal_arguments() {
        let args = parse(&["--bed", "regions.bed"]);
        assert_eq!(args.bam, vec![PathBuf::from("a.bam"), PathBuf::from("b.bam")]);
        assert_eq!(args.min_mapq, 20);
        assert_eq!(args.max_flag, 255);
        assert_eq!(args.min_len, 30);
        assert!(!args.fail_fast);
        assert!(matches!(args.region_source(&[]).unwrap(), RegionSource::Bed(_)));

        let config = args.count_config().unwrap();
        assert_eq!(config.cell_tag.as_deref(), Some("CB"));
        assert_eq!(config.umi_tag.as_deref(), Some("UB"));
    }

    #[test]
    fn bins_default_to_canonical_contigs() {
        let header = vec!["chr1".to_string(), "chrUn_x".to_string(), "chrX".to_string()];
        let args = parse(&["--bin-size", "1000"]);
        match args.region_source(&header).unwrap() {
            RegionSource::Bins { chroms, bin_size } => {
                assert_eq!(chroms, vec!["chr1", "chrX"]);
                assert_eq!(bin_size, 1000);
            }
            other => panic!("expected bins, got {:?}", other),
        }

        let all = parse(&["--bin-size", "1000", "-A"]);
        assert!(matches!(
            all.region_source(&header).unwrap(),
            RegionSource::Bins { ref chroms, .. } if chroms.len() == 3
        ));
    }

    #[test]
    fn missing_region_source_is_rejected() {
        assert!(parse(&[]).region_source(&[]).is_err());
    }

    #[test]
    fn conflicting_region_flags_are_rejected() {
        let argv = [
            "count", "--bam", "a.bam", "--barcodes", "b.tsv", "--outdir", "o", "--bed", "r.bed",
            "--genes", "g.tsv",
        ];
        assert!(CountArgs::from_iter_safe(&argv).is_err());
    }

    #[test]
    fn disabled_cell_tag_is_rejected() {
        let args = parse(&["--bed", "r.bed", "--cell-tag", "None", "--umi-tag", "None"]);
        assert!(args.count_config().is_err());
        let reads = parse(&["--bed", "r.bed", "--umi-tag", "None"]);
        assert_eq!(reads.count_config().unwrap().umi_tag, None);
    }
}
