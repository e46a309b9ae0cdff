//! featcount - per-region, per-cell read and UMI counting
//!
//! featcount counts, for each genomic region and each whitelisted cell
//! barcode, the reads or distinct UMIs found in indexed BAM/CRAM files and
//! writes the non-zero entries as a sparse matrix.
//!
//! # Usage
//!
//! ```bash
//! # Count UMIs per gene
//! featcount count --bam sample.bam --barcodes barcodes.tsv --genes genes.tsv --outdir out
//!
//! # Count reads in 10 kb bins of chr1 and chr2 across two BAM files
//! featcount count --bam a.bam,b.bam --barcodes barcodes.tsv --bin-size 10000 \
//!     --chroms chr1,chr2 --umi-tag None --outdir out --threads 8
//! ```

extern crate featcount_lib;
pub mod commands;
use anyhow::Result;
use env_logger::Env;
use featcount_lib::core::errors::is_broken_pipe;
use log::*;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case", author, about)]
/// Per-region, per-cell read and UMI counting for single-cell BAM files
struct Args {
    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Count reads or UMIs per region and cell barcode
    Count(commands::CountArgs),
}

impl Subcommand {
    fn run(self) -> Result<()> {
        match self {
            Subcommand::Count(args) => commands::run_count(args)?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = Args::from_args().subcommand.run() {
        if is_broken_pipe(&err) {
            std::process::exit(0);
        }
        error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
