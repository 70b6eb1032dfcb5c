use std::ops::Index;

/// One query result: the object's payload and an ordering key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorEntry {
    pub id: u32,
    /// Squared distance halved and saturated to 32 bits. Only meaningful for
    /// ordering.
    pub key: u32,
}

/// Bounded sink for the results of a single grid query.
///
/// Writes into caller-supplied storage and silently drops results once the
/// storage is full, so a query never fails. Use [`Collector::is_full`] to
/// detect truncation.
#[derive(Debug)]
pub struct Collector<'a> {
    entries: &'a mut [CollectorEntry],
    len: usize,
}

impl<'a> Collector<'a> {
    pub fn new(storage: &'a mut [CollectorEntry]) -> Self {
        Self {
            entries: storage,
            len: 0,
        }
    }

    /// Record a result. Dropped when the collector is full.
    #[inline]
    pub fn add(&mut self, id: u32, distance: u64) {
        if let Some(slot) = self.entries.get_mut(self.len) {
            *slot = CollectorEntry {
                id,
                key: u32::try_from(distance >> 1).unwrap_or(u32::MAX),
            };
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// True once results may have been dropped.
    pub fn is_full(&self) -> bool {
        self.len == self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.entries().get(index).map(|e| e.id)
    }

    /// Stored payloads in insertion (or, after [`Collector::sort`], key) order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries().iter().map(|e| e.id)
    }

    pub fn entries(&self) -> &[CollectorEntry] {
        &self.entries[..self.len]
    }

    /// Forget all results, keeping the storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Stable ascending sort by key. Call after the query has finished.
    pub fn sort(&mut self) {
        self.entries[..self.len].sort_by_key(|e| e.key);
    }
}

impl Index<usize> for Collector<'_> {
    type Output = u32;

    fn index(&self, index: usize) -> &u32 {
        &self.entries()[index].id
    }
}
