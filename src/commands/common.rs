use anyhow::{Context, Result};
use featcount_lib::core::prelude::{is_bgzipped, open_text};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Ensure an output path ends with a gzip-compatible extension.
pub fn ensure_gz_path(path: &Path) -> PathBuf {
    if is_bgzipped(path) {
        return path.to_path_buf();
    }

    let mut adjusted = path.to_path_buf();
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        adjusted.set_file_name(format!("{}.gz", name));
    } else {
        adjusted.set_extension("gz");
    }
    adjusted
}

/// Read a list of alignment paths, one per line. Blank lines are ignored.
pub fn read_path_list(list: &Path) -> Result<Vec<PathBuf>> {
    let reader =
        open_text(list).with_context(|| format!("Failed to open path list {}", list.display()))?;
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            paths.push(PathBuf::from(trimmed));
        }
    }
    Ok(paths)
}
