use anyhow::{Context, Result};
use featcount_lib::core::prelude::{get_writer, WriterOptions};
use featcount_lib::pipeline::count::{BarcodeIndex, CountEntry, Region};
use log::info;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::commands::common::ensure_gz_path;

pub const REGIONS_FILE: &str = "regions.tsv";
pub const BARCODES_FILE: &str = "barcodes.tsv";
pub const COUNTS_FILE: &str = "counts.tsv";

/// 1-based row of the counts file.
#[derive(Debug, Serialize)]
struct Triplet {
    region: usize,
    barcode: u32,
    count: u32,
}

impl From<&CountEntry> for Triplet {
    fn from(entry: &CountEntry) -> Self {
        Self {
            region: entry.region_index + 1,
            barcode: entry.barcode_index + 1,
            count: entry.count,
        }
    }
}

/// Output directory of one counting run.
pub struct OutputDir {
    root: PathBuf,
    options: WriterOptions,
}

impl OutputDir {
    pub fn create(root: &Path, gzip: bool, threads: usize) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create output directory {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            options: WriterOptions {
                gzipped: gzip,
                threads,
                ..WriterOptions::default()
            },
        })
    }

    /// Region ids, one per line, in region order.
    pub fn write_regions(&self, regions: &[Region]) -> Result<PathBuf> {
        let path = self.root.join(REGIONS_FILE);
        write_lines(&path, regions.iter().map(Region::id))?;
        Ok(path)
    }

    /// Whitelisted barcodes, one per line, in index order.
    pub fn write_barcodes(&self, barcodes: &BarcodeIndex) -> Result<PathBuf> {
        let path = self.root.join(BARCODES_FILE);
        write_lines(&path, barcodes.barcodes().iter().map(String::as_str))?;
        Ok(path)
    }

    /// Open the counts file under a temporary `.partial` name.
    pub fn counts_writer(&self) -> Result<CountsWriter> {
        let target = self.root.join(COUNTS_FILE);
        let target = if self.options.gzipped {
            ensure_gz_path(&target)
        } else {
            target
        };
        let partial = partial_path(&target);
        let writer = get_writer(Some(&partial), self.options)
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        Ok(CountsWriter {
            writer,
            partial,
            target,
            written: 0,
        })
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

fn write_lines<'a, I: IntoIterator<Item = &'a str>>(path: &Path, lines: I) -> Result<()> {
    let mut writer = get_writer(Some(path), WriterOptions::default())
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for line in lines {
        writer.write_record(&[line])?;
    }
    writer.flush()?;
    Ok(())
}

/// Streams count triplets to `<target>.partial` until [`CountsWriter::finish`].
pub struct CountsWriter {
    writer: csv::Writer<Box<dyn Write>>,
    partial: PathBuf,
    target: PathBuf,
    written: usize,
}

impl CountsWriter {
    pub fn write_batch(&mut self, entries: &[CountEntry]) -> featcount_lib::Result<()> {
        for entry in entries {
            self.writer.serialize(Triplet::from(entry))?;
        }
        self.written += entries.len();
        Ok(())
    }

    /// Flush, close and move the file to its final name.
    pub fn finish(self) -> Result<PathBuf> {
        let CountsWriter {
            writer,
            partial,
            target,
            written,
        } = self;
        let mut inner = writer
            .into_inner()
            .map_err(|err| err.into_error())
            .with_context(|| format!("Failed to flush {}", partial.display()))?;
        inner.flush()?;
        drop(inner);
        fs::rename(&partial, &target).with_context(|| {
            format!("Failed to move {} to {}", partial.display(), target.display())
        })?;
        info!("Wrote {} count entries to {}", written, target.display());
        Ok(target)
    }

    /// Close the file without renaming it and return where it was left.
    pub fn abandon(self) -> PathBuf {
        let CountsWriter {
            mut writer,
            partial,
            ..
        } = self;
        if let Err(err) = writer.flush() {
            log::debug!("Flushing partial counts failed: {}", err);
        }
        drop(writer);
        partial
    }
}
