pub mod common;
pub mod count;

/// Canonical human contigs binned by default when no chromosomes are named.
///
/// The list follows UCSC naming (chr-prefixed autosomes, sex chromosomes and
/// mitochondrial DNA). Use `--allcontigs` to bin every contig in the header.
pub const STANDARD_CONTIGS: &[&str] = &[
    "chr1", "chr2", "chr3", "chr4", "chr5", "chr6", "chr7", "chr8", "chr9", "chr10", "chr11",
    "chr12", "chr13", "chr14", "chr15", "chr16", "chr17", "chr18", "chr19", "chr20", "chr21",
    "chr22", "chrX", "chrY", "chrM",
];

/// Returns `true` when a contig name is listed in [`STANDARD_CONTIGS`],
/// with or without the `chr` prefix.
#[inline]
pub fn is_standard_contig(name: &str) -> bool {
    let bare = name.strip_prefix("chr").unwrap_or(name);
    STANDARD_CONTIGS
        .iter()
        .any(|contig| contig[3..].eq_ignore_ascii_case(bare))
}

pub use count::{run_count, CountArgs};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_contigs_ignore_prefix() {
        assert!(is_standard_contig("chr7"));
        assert!(is_standard_contig("X"));
        assert!(is_standard_contig("chrM"));
        assert!(!is_standard_contig("chrUn_gl000220"));
        assert!(!is_standard_contig("GL000220.1"));
    }
}
