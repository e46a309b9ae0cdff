//! Cell barcode whitelist

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use crate::core::error::{FeatCountError, Result};
use crate::core::fs::open_text;

/// Sorted, deduplicated list of expected cell barcodes.
///
/// A barcode's index is its position in sort order. The list is shared
/// read-only between workers.
#[derive(Debug, Clone, Default)]
pub struct BarcodeIndex {
    sorted: Arc<Vec<String>>,
}

impl BarcodeIndex {
    /// Build an index from any collection of barcodes, dropping duplicates.
    pub fn build<I, S>(barcodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sorted: Vec<String> = barcodes.into_iter().map(Into::into).collect();
        sorted.sort_unstable();
        sorted.dedup();
        sorted.shrink_to_fit();
        Self {
            sorted: Arc::new(sorted),
        }
    }

    /// Load a whitelist with one barcode per line (plain or gzip).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_text(path)?;
        let mut barcodes = Vec::with_capacity(1024);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let barcode = line.trim();
            if barcode.is_empty() {
                continue;
            }
            if barcode.contains(char::is_whitespace) {
                return Err(FeatCountError::parse(
                    path,
                    idx + 1,
                    format!("barcode '{}' contains whitespace", barcode),
                ));
            }
            barcodes.push(barcode.to_string());
        }
        Ok(Self::build(barcodes))
    }

    /// Position of `candidate` in the index.
    #[inline]
    pub fn lookup(&self, candidate: &str) -> Option<u32> {
        self.sorted
            .binary_search_by(|known| known.as_str().cmp(candidate))
            .ok()
            .map(|idx| idx as u32)
    }

    /// Match a batch of observed barcodes, returning results in input order.
    ///
    /// The batch is sorted once and walked with a lower bound that only moves
    /// forward, so each search covers the remaining tail of the index.
    pub fn match_batch<S: AsRef<str>>(&self, observed: &[S]) -> Vec<Option<u32>> {
        let mut order: Vec<usize> = (0..observed.len()).collect();
        order.sort_unstable_by(|&a, &b| observed[a].as_ref().cmp(observed[b].as_ref()));

        let mut matches = vec![None; observed.len()];
        let mut lower = 0usize;
        for idx in order {
            if lower >= self.sorted.len() {
                break;
            }
            let candidate = observed[idx].as_ref();
            match self.sorted[lower..].binary_search_by(|known| known.as_str().cmp(candidate)) {
                Ok(offset) => {
                    matches[idx] = Some((lower + offset) as u32);
                    lower += offset;
                }
                Err(offset) => lower += offset,
            }
        }
        matches
    }

    /// Barcode stored at `index`.
    #[inline]
    pub fn barcode(&self, index: u32) -> Option<&str> {
        self.sorted.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Borrow the sorted whitelist without cloning.
    pub fn barcodes(&self) -> &[String] {
        &self.sorted[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn build_sorts_and_deduplicates() {
        let index = BarcodeIndex::build(vec!["GGGG", "AAAA", "CCCC", "AAAA"]);
        assert_eq!(index.barcodes(), &["AAAA", "CCCC", "GGGG"]);
        assert_eq!(index.lookup("CCCC"), Some(1));
        assert_eq!(index.lookup("TTTT"), None);
        assert_eq!(index.barcode(2), Some("GGGG"));
    }

    #[test]
    fn unknown_barcode_has_no_match() {
        let index = BarcodeIndex::build(vec!["AAAA", "CCCC", "GGGG"]);
        assert_eq!(index.match_batch(&["TTTT"]), vec![None]);
    }

    #[test]
    fn batch_results_follow_input_order() {
        let index = BarcodeIndex::build(vec!["AAAA", "CCCC", "GGGG"]);
        let observed = ["GGGG", "TTTT", "AAAA", "CCCA", "CCCC"];
        assert_eq!(
            index.match_batch(&observed),
            vec![Some(2), None, Some(0), None, Some(1)]
        );
    }

    #[test]
    fn reads_whitelist_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("barcodes.tsv");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"CCCC-1\nAAAA-1\n\nCCCC-1\n")
            .unwrap();
        let index = BarcodeIndex::from_file(&path).unwrap();
        assert_eq!(index.barcodes(), &["AAAA-1", "CCCC-1"]);

        let bad = dir.path().join("bad.tsv");
        std::fs::File::create(&bad)
            .unwrap()
            .write_all(b"AAAA\nCC CC\n")
            .unwrap();
        assert!(matches!(
            BarcodeIndex::from_file(&bad),
            Err(FeatCountError::Parse { line: 2, .. })
        ));
    }

    proptest! {
        #[test]
        fn lookup_is_unique_and_in_range(
            barcodes in prop::collection::vec("[ACGT]{4,8}", 0..200),
            queries in prop::collection::vec("[ACGTN]{4,8}", 0..50),
        ) {
            let index = BarcodeIndex::build(barcodes.clone());
            let mut seen = HashSet::new();
            for barcode in barcodes.iter().collect::<HashSet<_>>() {
                let pos = index.lookup(barcode).unwrap();
                prop_assert!((pos as usize) < index.len());
                prop_assert_eq!(index.barcode(pos), Some(barcode.as_str()));
                prop_assert!(seen.insert(pos));
            }
            for query in &queries {
                let expected = barcodes.contains(query);
                prop_assert_eq!(index.lookup(query).is_some(), expected);
            }
            let batch = index.match_batch(&queries);
            let single: Vec<_> = queries.iter().map(|p| index.lookup(p)).collect();
            prop_assert_eq!(batch, single);
        }
    }
}
