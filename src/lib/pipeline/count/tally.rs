//! UMI deduplication and per-barcode tallies for a single region.

use rustc_hash::{FxHashMap, FxHashSet};
use smartstring::alias::String as CompactString;

use crate::core::read_filter::AcceptedRead;

/// Distinct barcodes of a region in first-occurrence order, with their counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub barcodes: Vec<CompactString>,
    pub counts: Vec<u32>,
}

impl Tally {
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    fn add(&mut self, positions: &mut FxHashMap<CompactString, usize>, barcode: CompactString) {
        match positions.get(&barcode) {
            Some(&slot) => self.counts[slot] += 1,
            None => {
                positions.insert(barcode.clone(), self.barcodes.len());
                self.barcodes.push(barcode);
                self.counts.push(1);
            }
        }
    }
}

/// Collapse accepted reads into per-barcode counts.
///
/// With `use_umi`, only the first read of every (UMI, barcode) pair is kept,
/// so counts are molecules rather than reads. Reads without a barcode, and
/// reads without a UMI when `use_umi` is set, contribute nothing.
pub fn tally<I>(reads: I, use_umi: bool) -> Tally
where
    I: IntoIterator<Item = AcceptedRead>,
{
    let mut result = Tally::default();
    let mut positions: FxHashMap<CompactString, usize> = FxHashMap::default();
    let mut molecules: FxHashSet<(CompactString, CompactString)> = FxHashSet::default();

    for read in reads {
        let Some(barcode) = read.barcode else {
            continue;
        };
        if use_umi {
            let Some(umi) = read.umi else {
                continue;
            };
            if !molecules.insert((umi, barcode.clone())) {
                continue;
            }
        }
        result.add(&mut positions, barcode);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn read(umi: &str, barcode: &str) -> AcceptedRead {
        AcceptedRead {
            barcode: Some(barcode.into()),
            umi: Some(umi.into()),
        }
    }

    #[test]
    fn duplicate_molecules_collapse() {
        let reads = vec![read("U1", "AAAA"), read("U1", "AAAA"), read("U2", "AAAA")];
        let result = tally(reads, true);
        assert_eq!(result.barcodes, vec![CompactString::from("AAAA")]);
        assert_eq!(result.counts, vec![2]);
    }

    #[test]
    fn read_counting_without_umi() {
        let reads = vec![read("U1", "AAAA"), read("U1", "AAAA"), read("U2", "CCCC")];
        let result = tally(reads, false);
        assert_eq!(result.counts, vec![2, 1]);
    }

    #[test]
    fn first_occurrence_order_is_kept() {
        let reads = vec![
            read("U1", "GGGG"),
            read("U2", "AAAA"),
            read("U3", "GGGG"),
            read("U4", "CCCC"),
        ];
        let result = tally(reads, true);
        let order: Vec<&str> = result.barcodes.iter().map(|b| b.as_str()).collect();
        assert_eq!(order, vec!["GGGG", "AAAA", "CCCC"]);
        assert_eq!(result.counts, vec![2, 1, 1]);
    }

    #[test]
    fn same_umi_in_different_cells_counts_twice() {
        let result = tally(vec![read("U1", "AAAA"), read("U1", "CCCC")], true);
        assert_eq!(result.counts, vec![1, 1]);
    }

    #[test]
    fn empty_input_is_empty_tally() {
        assert!(tally(Vec::new(), true).is_empty());
    }

    #[test]
    fn tallying_deduplicated_reads_is_idempotent() {
        let raw = vec![
            read("U1", "AAAA"),
            read("U1", "AAAA"),
            read("U2", "AAAA"),
            read("U2", "CCCC"),
            read("U2", "CCCC"),
        ];
        let mut seen = FxHashSet::default();
        let deduplicated: Vec<_> = raw
            .iter()
            .filter(|r| seen.insert((r.umi.clone(), r.barcode.clone())))
            .cloned()
            .collect();
        assert_eq!(tally(raw, true), tally(deduplicated, true));
    }

    fn reads_from(pairs: &[(u8, u8)]) -> Vec<AcceptedRead> {
        pairs
            .iter()
            .map(|(umi, barcode)| read(&format!("U{}", umi), &format!("B{}", barcode)))
            .collect()
    }

    proptest! {
        #[test]
        fn tally_is_idempotent_and_ordered(
            pairs in prop::collection::vec((0u8..4, 0u8..6), 0..80)
        ) {
            let raw = reads_from(&pairs);
            let mut seen = FxHashSet::default();
            let deduplicated: Vec<_> = raw
                .iter()
                .filter(|r| seen.insert((r.umi.clone(), r.barcode.clone())))
                .cloned()
                .collect();

            let result = tally(raw.clone(), true);
            prop_assert_eq!(&result, &tally(deduplicated.clone(), true));
            prop_assert_eq!(&result, &tally(deduplicated.clone(), false));

            let mut first_seen: Vec<CompactString> = Vec::new();
            for r in &raw {
                let barcode = r.barcode.clone().unwrap();
                if !first_seen.contains(&barcode) {
                    first_seen.push(barcode);
                }
            }
            prop_assert_eq!(&result.barcodes, &first_seen);
            prop_assert!(result.counts.iter().all(|&c| c >= 1));
            prop_assert_eq!(result.counts.iter().sum::<u32>() as usize, deduplicated.len());

            let reads = tally(raw, false);
            prop_assert_eq!(&reads.barcodes, &first_seen);
            prop_assert_eq!(reads.counts.iter().sum::<u32>() as usize, pairs.len());
        }
    }
}
