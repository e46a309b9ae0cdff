use std::collections::BTreeMap;

use crate::core::error::Result;

/// Re-establishes region order for results that complete out of order.
///
/// Each region index must be pushed exactly once; `None` marks a region that
/// produced no output (a failure) so later regions are not held back.
#[derive(Debug)]
pub(crate) struct OrderedReplay<T> {
    next: usize,
    pending: BTreeMap<usize, Option<Vec<T>>>,
}

impl<T> OrderedReplay<T> {
    pub(crate) fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Buffer a completion and emit every region that is now in order.
    pub(crate) fn push<K>(&mut self, index: usize, items: Option<Vec<T>>, emit: &mut K) -> Result<()>
    where
        K: FnMut(usize, Vec<T>) -> Result<()>,
    {
        self.pending.insert(index, items);
        while let Some(items) = self.pending.remove(&self.next) {
            if let Some(items) = items {
                emit(self.next, items)?;
            }
            self.next += 1;
        }
        Ok(())
    }

    /// Number of leading regions already emitted or skipped.
    pub(crate) fn released(&self) -> usize {
        self.next
    }

    pub(crate) fn buffered(&self) -> usize {
        self.pending.len()
    }
}
