//! Type-partitioned index of committed records
//!
//! type name -> (uid -> entry). Each type gets its own sub-map, created on
//! first insert under the outer write lock. Lookups only take read locks.
//!
//! Every mutation is a single map operation, so a map left behind by a
//! panicking holder is still consistent; poisoned locks are recovered.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::uid::Uid;

/// Where an object's latest committed state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Journal record id
    pub id: u64,
    /// Encoded payload as written to the journal
    pub payload: Vec<u8>,
}

type TypeMap = Arc<RwLock<HashMap<Uid, IndexEntry>>>;

/// In-memory map of every live record, keyed by (type name, uid).
#[derive(Debug, Default)]
pub struct TypeIndex {
    types: RwLock<HashMap<String, TypeMap>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn type_map(&self, type_name: &str) -> Option<TypeMap> {
        read(&self.types).get(type_name).cloned()
    }

    fn type_map_or_insert(&self, type_name: &str) -> TypeMap {
        if let Some(map) = self.type_map(type_name) {
            return map;
        }
        let mut types = write(&self.types);
        Arc::clone(types.entry(type_name.to_string()).or_default())
    }

    /// The entry for `uid` under `type_name`, if indexed.
    pub fn get(&self, uid: &Uid, type_name: &str) -> Option<IndexEntry> {
        let map = self.type_map(type_name)?;
        let entries = read(&map);
        entries.get(uid).cloned()
    }

    /// Record id of the entry, without copying the payload.
    pub fn record_id(&self, uid: &Uid, type_name: &str) -> Option<u64> {
        let map = self.type_map(type_name)?;
        let entries = read(&map);
        entries.get(uid).map(|e| e.id)
    }

    pub fn contains(&self, uid: &Uid, type_name: &str) -> bool {
        self.record_id(uid, type_name).is_some()
    }

    /// Inserts or replaces, returning the previous entry.
    pub fn insert(&self, uid: Uid, type_name: &str, entry: IndexEntry) -> Option<IndexEntry> {
        let map = self.type_map_or_insert(type_name);
        let mut entries = write(&map);
        entries.insert(uid, entry)
    }

    /// Removes and returns the entry. The type's sub-map stays registered.
    pub fn remove(&self, uid: &Uid, type_name: &str) -> Option<IndexEntry> {
        let map = self.type_map(type_name)?;
        let mut entries = write(&map);
        entries.remove(uid)
    }

    /// Every type name observed since start, including types whose entries
    /// have all been removed. Unordered.
    pub fn known_types(&self) -> Vec<String> {
        read(&self.types).keys().cloned().collect()
    }

    /// Uids indexed under `type_name`. Unordered; empty for unknown types.
    pub fn identities_for_type(&self, type_name: &str) -> Vec<Uid> {
        let Some(map) = self.type_map(type_name) else {
            return Vec::new();
        };
        let entries = read(&map);
        entries.keys().copied().collect()
    }

    /// Total number of entries across all types.
    pub fn len(&self) -> usize {
        let maps: Vec<TypeMap> = read(&self.types).values().cloned().collect();
        maps.iter().map(|m| read(m).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64) -> IndexEntry {
        IndexEntry { id, payload: vec![id as u8] }
    }

    #[test]
    fn test_insert_get_remove() {
        let index = TypeIndex::new();
        let uid = Uid::new();

        assert!(index.insert(uid, "T", entry(1)).is_none());
        assert_eq!(index.get(&uid, "T"), Some(entry(1)));
        assert_eq!(index.record_id(&uid, "T"), Some(1));
        assert!(index.contains(&uid, "T"));
        assert!(!index.contains(&uid, "Other"));

        assert_eq!(index.insert(uid, "T", entry(1)), Some(entry(1)));
        assert_eq!(index.remove(&uid, "T"), Some(entry(1)));
        assert!(!index.contains(&uid, "T"));
        assert!(index.remove(&uid, "T").is_none());
    }

    #[test]
    fn test_same_uid_under_two_types() {
        let index = TypeIndex::new();
        let uid = Uid::new();
        index.insert(uid, "A", entry(1));
        index.insert(uid, "B", entry(2));

        assert_eq!(index.record_id(&uid, "A"), Some(1));
        assert_eq!(index.record_id(&uid, "B"), Some(2));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_enumeration() {
        let index = TypeIndex::new();
        let (a, b) = (Uid::new(), Uid::new());
        index.insert(a, "T", entry(1));
        index.insert(b, "T", entry(2));
        index.insert(a, "U", entry(3));
        index.remove(&a, "U");

        let mut types = index.known_types();
        types.sort();
        assert_eq!(types, vec!["T".to_string(), "U".to_string()]);

        let mut uids = index.identities_for_type("T");
        uids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(uids, expected);

        assert!(index.identities_for_type("U").is_empty());
        assert!(index.identities_for_type("missing").is_empty());
    }

    #[test]
    fn test_concurrent_first_insert_shares_one_type_map() {
        use std::sync::Barrier;
        use std::thread;

        let index = Arc::new(TypeIndex::new());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let index = Arc::clone(&index);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    index.insert(Uid::new(), "Shared", entry(i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(index.identities_for_type("Shared").len(), 8);
        assert_eq!(index.known_types().len(), 1);
    }
}
