mod args;
mod output;

use anyhow::{Context, Result};
use featcount_lib::core::concurrency::determine_allowed_cpus;
use featcount_lib::engine::par_regions::ParRegions;
use featcount_lib::pipeline::count::{
    AlignmentSource, BamSourceFactory, BarcodeIndex, RegionCounter, SourceFactory,
};
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

pub use args::CountArgs;
use output::OutputDir;

/// Entry point for the `count` command.
pub fn run_count(args: CountArgs) -> Result<()> {
    let start_time = Instant::now();

    let config = args.count_config()?;
    let filter = config.read_filter()?;
    let active_threads = determine_allowed_cpus(config.threads)?;

    let paths = args.alignment_paths()?;
    info!("Opening {} alignment file(s)", paths.len());
    let factory = BamSourceFactory::new(paths, args.reference.clone())?;
    let source = factory
        .open()
        .with_context(|| format!("Failed to open indexed alignments {:?}", factory.paths()))?;

    let region_source = args.region_source(&source.reference_names())?;
    let regions = region_source
        .load(&source)
        .with_context(|| format!("Failed to load regions from {:?}", region_source))?;
    info!("Loaded {} regions", regions.len());

    info!("Loading cell barcodes from {:?}", args.barcodes);
    let barcodes = Arc::new(
        BarcodeIndex::from_file(&args.barcodes)
            .with_context(|| format!("Failed to load barcodes from {:?}", args.barcodes))?,
    );
    info!("Loaded {} valid barcodes", barcodes.len());

    let outdir = OutputDir::create(&args.outdir, args.gzip, active_threads)?;
    outdir.write_regions(&regions)?;
    outdir.write_barcodes(&barcodes)?;

    let counter = RegionCounter::new(Arc::clone(&barcodes), filter);
    let driver = ParRegions::new(
        factory,
        counter,
        Some(active_threads),
        config.failure_policy(),
    )?
    .with_handle(source);

    let mut counts = outdir.counts_writer()?;
    let result = driver.process(&regions, |_, batch| counts.write_batch(&batch));
    match result {
        Ok(summary) => {
            counts.finish()?;
            info!(
                "Counted {} regions ({} entries) in {:?}",
                summary.regions,
                summary.items,
                start_time.elapsed()
            );
            Ok(())
        }
        Err(err) => {
            let partial = counts.abandon();
            error!("Incomplete counts left at {}", partial.display());
            Err(err).context("Counting did not complete")
        }
    }
}
