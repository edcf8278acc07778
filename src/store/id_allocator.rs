//! Record id allocation
//!
//! An (uid, type) pair that is already indexed keeps its id; any other
//! pair gets the next value of a per-store counter. Lookup and increment
//! happen under one mutex, so concurrent callers never mint the same id.
//! The counter stops at `u64::MAX`; it never wraps back to ids in use.

use std::sync::{Mutex, PoisonError};

use crate::uid::Uid;

use super::errors::{StoreError, StoreResult};
use super::type_index::TypeIndex;

/// Monotonic record id source for one store.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: Mutex<u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the counter to at least `max_id`. Never lowers it.
    pub fn seed(&self, max_id: u64) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        *last = (*last).max(max_id);
    }

    /// The indexed id for the pair, or a freshly minted one.
    pub fn resolve(&self, index: &TypeIndex, uid: &Uid, type_name: &str) -> StoreResult<u64> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = index.record_id(uid, type_name) {
            return Ok(id);
        }
        let next = last
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted { last: *last })?;
        *last = next;
        Ok(next)
    }

    /// The highest id minted or seeded so far.
    pub fn last_allocated(&self) -> u64 {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::type_index::IndexEntry;

    #[test]
    fn test_mints_increasing_ids() {
        let ids = IdAllocator::new();
        let index = TypeIndex::new();
        assert_eq!(ids.resolve(&index, &Uid::new(), "T").unwrap(), 1);
        assert_eq!(ids.resolve(&index, &Uid::new(), "T").unwrap(), 2);
        assert_eq!(ids.last_allocated(), 2);
    }

    #[test]
    fn test_reuses_indexed_id() {
        let ids = IdAllocator::new();
        let index = TypeIndex::new();
        let uid = Uid::new();
        index.insert(uid, "T", IndexEntry { id: 42, payload: Vec::new() });

        assert_eq!(ids.resolve(&index, &uid, "T").unwrap(), 42);
        assert_eq!(ids.last_allocated(), 0);
        assert_eq!(ids.resolve(&index, &uid, "Other").unwrap(), 1);
    }

    #[test]
    fn test_seed_never_lowers() {
        let ids = IdAllocator::new();
        ids.seed(10);
        ids.seed(3);
        assert_eq!(ids.last_allocated(), 10);
        assert_eq!(ids.resolve(&TypeIndex::new(), &Uid::new(), "T").unwrap(), 11);
    }

    #[test]
    fn test_exhausted_counter_errors_without_wrapping() {
        let ids = IdAllocator::new();
        let index = TypeIndex::new();
        let uid = Uid::new();
        index.insert(uid, "T", IndexEntry { id: 5, payload: Vec::new() });
        ids.seed(u64::MAX);

        let err = ids.resolve(&index, &Uid::new(), "T").unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted { last: u64::MAX }));
        assert_eq!(ids.last_allocated(), u64::MAX);
        // indexed pairs still resolve
        assert_eq!(ids.resolve(&index, &uid, "T").unwrap(), 5);
    }
}
