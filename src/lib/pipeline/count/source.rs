//! Alignment sources the region counter reads from.
//!
//! [`AlignmentSource`] is a handle that can seek to a region and stream the
//! overlapping reads. Handles are not shared between threads: a
//! [`SourceFactory`] opens one per worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use rust_htslib::bam::{self, Read};
use rustc_hash::FxHashMap;

use crate::core::error::{FeatCountError, Result};
use crate::core::record::{AlignedRead, ReadRecord};

/// Indexed access to aligned reads.
pub trait AlignmentSource {
    type Read: AlignedRead;

    /// Reference sequence names known to the source.
    fn reference_names(&self) -> Vec<String>;

    /// Length of a reference sequence, `None` when unknown.
    fn reference_length(&self, chrom: &str) -> Option<u64>;

    /// Visit every read overlapping `[start0, stop0)` (0-based, half-open)
    /// in the source's natural order.
    fn fetch<F>(&mut self, chrom: &str, start0: u64, stop0: u64, visit: F) -> Result<()>
    where
        F: FnMut(&Self::Read);
}

/// Opens independent [`AlignmentSource`] handles onto the same data.
pub trait SourceFactory: Send + Sync {
    type Source: AlignmentSource;

    fn open(&self) -> Result<Self::Source>;
}

/// Find the name under which `chrom` is known to `source`, toggling a `chr`
/// prefix when the name as given is absent.
pub fn resolve_reference<S: AlignmentSource + ?Sized>(source: &S, chrom: &str) -> Option<String> {
    if source.reference_length(chrom).is_some() {
        return Some(chrom.to_string());
    }
    let alternative = match chrom.strip_prefix("chr") {
        Some(stripped) => stripped.to_string(),
        None => format!("chr{}", chrom),
    };
    source
        .reference_length(&alternative)
        .map(|_| alternative)
}

/// A single indexed BAM/CRAM file read through rust-htslib.
pub struct BamSource {
    path: PathBuf,
    reader: bam::IndexedReader,
    names: Vec<String>,
    targets: FxHashMap<String, (u32, u64)>,
    record: bam::Record,
}

impl BamSource {
    pub fn open<P: AsRef<Path>>(path: P, reference: Option<&Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = bam::IndexedReader::from_path(&path)?;
        if let Some(fasta) = reference {
            reader.set_reference(fasta)?;
        }

        let (names, targets) = {
            let header = reader.header();
            let mut names = Vec::with_capacity(header.target_count() as usize);
            let mut targets =
                FxHashMap::with_capacity_and_hasher(names.capacity(), Default::default());
            for tid in 0..header.target_count() {
                let name = String::from_utf8_lossy(header.tid2name(tid)).into_owned();
                let length = header.target_len(tid).unwrap_or(0);
                targets.insert(name.clone(), (tid, length));
                names.push(name);
            }
            (names, targets)
        };
        debug!("Opened {} with {} references", path.display(), names.len());

        Ok(Self {
            path,
            reader,
            names,
            targets,
            record: bam::Record::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlignmentSource for BamSource {
    type Read = bam::Record;

    fn reference_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn reference_length(&self, chrom: &str) -> Option<u64> {
        self.targets.get(chrom).map(|&(_, length)| length)
    }

    fn fetch<F>(&mut self, chrom: &str, start0: u64, stop0: u64, mut visit: F) -> Result<()>
    where
        F: FnMut(&Self::Read),
    {
        let &(tid, _) = self
            .targets
            .get(chrom)
            .ok_or_else(|| FeatCountError::ReferenceNotFound(chrom.to_string()))?;
        self.reader.fetch((tid, start0 as i64, stop0 as i64))?;
        while let Some(result) = self.reader.read(&mut self.record) {
            result?;
            visit(&self.record);
        }
        Ok(())
    }
}

/// Several sources read as one: reads are pooled in source order.
pub struct MultiSource<S> {
    sources: Vec<S>,
}

impl<S: AlignmentSource> MultiSource<S> {
    pub fn new(sources: Vec<S>) -> Self {
        Self { sources }
    }
}

impl<S: AlignmentSource> AlignmentSource for MultiSource<S> {
    type Read = S::Read;

    fn reference_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for source in &self.sources {
            for name in source.reference_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn reference_length(&self, chrom: &str) -> Option<u64> {
        self.sources
            .iter()
            .filter_map(|source| source.reference_length(chrom))
            .max()
    }

    fn fetch<F>(&mut self, chrom: &str, start0: u64, stop0: u64, mut visit: F) -> Result<()>
    where
        F: FnMut(&Self::Read),
    {
        let mut found = false;
        for source in self.sources.iter_mut() {
            if source.reference_length(chrom).is_none() {
                continue;
            }
            found = true;
            source.fetch(chrom, start0, stop0, &mut visit)?;
        }
        if found {
            Ok(())
        } else {
            Err(FeatCountError::ReferenceNotFound(chrom.to_string()))
        }
    }
}

/// Opens every BAM/CRAM in `paths` as one pooled [`MultiSource`].
#[derive(Debug, Clone)]
pub struct BamSourceFactory {
    paths: Vec<PathBuf>,
    reference: Option<PathBuf>,
}

impl BamSourceFactory {
    pub fn new(paths: Vec<PathBuf>, reference: Option<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(FeatCountError::Config(
                "At least one alignment file is required".to_string(),
            ));
        }
        Ok(Self { paths, reference })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl SourceFactory for BamSourceFactory {
    type Source = MultiSource<BamSource>;

    fn open(&self) -> Result<Self::Source> {
        let sources = self
            .paths
            .iter()
            .map(|path| BamSource::open(path, self.reference.as_deref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(MultiSource::new(sources))
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryData {
    references: Vec<(String, u64)>,
    reads: FxHashMap<String, Vec<ReadRecord>>,
}

/// Reads held in memory, keyed by reference name.
///
/// Cloning is cheap, so the source doubles as its own [`SourceFactory`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Arc<MemoryData>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_mut(&mut self) -> &mut MemoryData {
        Arc::make_mut(&mut self.data)
    }

    pub fn with_reference(mut self, name: &str, length: u64) -> Self {
        self.data_mut().references.push((name.to_string(), length));
        self
    }

    /// Add a read to `chrom`. Reads are returned in insertion order.
    pub fn with_read(mut self, chrom: &str, read: ReadRecord) -> Self {
        self.data_mut()
            .reads
            .entry(chrom.to_string())
            .or_default()
            .push(read);
        self
    }
}

impl AlignmentSource for MemorySource {
    type Read = ReadRecord;

    fn reference_names(&self) -> Vec<String> {
        self.data
            .references
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn reference_length(&self, chrom: &str) -> Option<u64> {
        self.data
            .references
            .iter()
            .find(|(name, _)| name == chrom)
            .map(|&(_, length)| length)
    }

    fn fetch<F>(&mut self, chrom: &str, start0: u64, stop0: u64, mut visit: F) -> Result<()>
    where
        F: FnMut(&Self::Read),
    {
        if self.reference_length(chrom).is_none() {
            return Err(FeatCountError::ReferenceNotFound(chrom.to_string()));
        }
        let (start0, stop0) = (start0 as i64, stop0 as i64);
        if let Some(reads) = self.data.reads.get(chrom) {
            for read in reads {
                if let Some((first, last)) = read.span() {
                    if first < stop0 && last >= start0 {
                        visit(read);
                    }
                }
            }
        }
        Ok(())
    }
}

impl SourceFactory for MemorySource {
    type Source = MemorySource;

    fn open(&self) -> Result<Self::Source> {
        Ok(self.clone())
    }
}
