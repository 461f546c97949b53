//! Root object of the safe: every table plus the commit counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::notes::Record;
use crate::table::{FileTable, IndexedMapTable, MapTable};

/// The counter restarts at zero once it gets this close to `u64::MAX`
const COMMIT_COUNT_HEADROOM: u64 = 10_000;

/// Three independent name-to-table registries.
///
/// Plain, indexed and file tables live in separate namespaces, so the same
/// name may be registered once in each. Tables are shared handles: a table
/// fetched from the index observes later mutations made through any other
/// handle to it.
#[derive(Debug, Default)]
pub struct MasterIndex {
    map_tables: RwLock<HashMap<String, Arc<MapTable<Record>>>>,
    indexed_tables: RwLock<HashMap<String, Arc<IndexedMapTable<Record>>>>,
    file_tables: RwLock<HashMap<String, Arc<FileTable>>>,
    commit_count: AtomicU64,
}

impl MasterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_map_table(&self, table: MapTable<Record>) -> Arc<MapTable<Record>> {
        let table = Arc::new(table);
        self.map_tables
            .write()
            .insert(table.name().to_string(), Arc::clone(&table));
        table
    }

    pub fn get_map_table(&self, name: &str) -> Option<Arc<MapTable<Record>>> {
        self.map_tables.read().get(name).cloned()
    }

    pub fn put_indexed_table(
        &self,
        table: IndexedMapTable<Record>,
    ) -> Arc<IndexedMapTable<Record>> {
        let table = Arc::new(table);
        self.indexed_tables
            .write()
            .insert(table.name().to_string(), Arc::clone(&table));
        table
    }

    pub fn get_indexed_table(&self, name: &str) -> Option<Arc<IndexedMapTable<Record>>> {
        self.indexed_tables.read().get(name).cloned()
    }

    pub fn put_file_table(&self, table: FileTable) -> Arc<FileTable> {
        let table = Arc::new(table);
        self.file_tables
            .write()
            .insert(table.name().to_string(), Arc::clone(&table));
        table
    }

    pub fn get_file_table(&self, name: &str) -> Option<Arc<FileTable>> {
        self.file_tables.read().get(name).cloned()
    }

    pub fn map_tables(&self) -> Vec<Arc<MapTable<Record>>> {
        self.map_tables.read().values().cloned().collect()
    }

    pub fn indexed_tables(&self) -> Vec<Arc<IndexedMapTable<Record>>> {
        self.indexed_tables.read().values().cloned().collect()
    }

    /// Every registered file table
    pub fn file_tables(&self) -> Vec<Arc<FileTable>> {
        self.file_tables.read().values().cloned().collect()
    }

    /// Whether no table of any kind is registered
    pub fn is_empty(&self) -> bool {
        self.map_tables.read().is_empty()
            && self.indexed_tables.read().is_empty()
            && self.file_tables.read().is_empty()
    }

    /// Number of successful commits, modulo the wrap point
    pub fn commit_count(&self) -> u64 {
        self.commit_count.load(Ordering::SeqCst)
    }

    pub(crate) fn set_commit_count(&self, count: u64) {
        self.commit_count.store(count, Ordering::SeqCst);
    }

    /// Increment the commit counter, restarting at zero near `u64::MAX`
    pub fn increment_commit_count(&self) -> u64 {
        let previous = self
            .commit_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(next_commit_count(count))
            })
            .unwrap_or_else(|count| count);
        next_commit_count(previous)
    }

    /// An independent copy with its own tables
    pub fn deep_clone(&self) -> Self {
        Self {
            map_tables: RwLock::new(copy_tables(&self.map_tables.read())),
            indexed_tables: RwLock::new(copy_tables(&self.indexed_tables.read())),
            file_tables: RwLock::new(copy_tables(&self.file_tables.read())),
            commit_count: AtomicU64::new(self.commit_count()),
        }
    }
}

fn copy_tables<T: Clone>(tables: &HashMap<String, Arc<T>>) -> HashMap<String, Arc<T>> {
    tables
        .iter()
        .map(|(name, table)| (name.clone(), Arc::new(table.as_ref().clone())))
        .collect()
}

fn next_commit_count(count: u64) -> u64 {
    if count >= u64::MAX - COMMIT_COUNT_HEADROOM {
        0
    } else {
        count + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::Note;

    #[test]
    fn test_namespaces_are_independent() {
        let index = MasterIndex::new();
        index.put_map_table(MapTable::new("SHARED"));
        index.put_indexed_table(IndexedMapTable::new("SHARED"));

        assert!(index.get_map_table("SHARED").is_some());
        assert!(index.get_indexed_table("SHARED").is_some());
        assert!(index.get_file_table("SHARED").is_none());
        assert!(index.get_map_table("missing").is_none());
    }

    #[test]
    fn test_tables_are_shared_handles() {
        let index = MasterIndex::new();
        index.put_indexed_table(IndexedMapTable::new("NOTES"));

        let handle = index.get_indexed_table("NOTES").expect("Table should exist");
        handle
            .put_entry(Note::new("Hello", "world").into())
            .expect("Put failed");

        let again = index.get_indexed_table("NOTES").expect("Table should exist");
        assert!(again.get_by_index("hello").is_some());
    }

    #[test]
    fn test_commit_count_increments() {
        let index = MasterIndex::new();
        assert_eq!(index.commit_count(), 0);
        assert_eq!(index.increment_commit_count(), 1);
        assert_eq!(index.increment_commit_count(), 2);
        assert_eq!(index.commit_count(), 2);
    }

    #[test]
    fn test_commit_count_wraps() {
        let index = MasterIndex::new();
        index.set_commit_count(u64::MAX - COMMIT_COUNT_HEADROOM - 1);
        assert_eq!(index.increment_commit_count(), u64::MAX - COMMIT_COUNT_HEADROOM);
        assert_eq!(index.increment_commit_count(), 0);
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let index = MasterIndex::new();
        let files = index.put_indexed_table(IndexedMapTable::new("NOTES"));
        files
            .put_entry(Note::new("One", "").into())
            .expect("Put failed");
        index.increment_commit_count();

        let copy = index.deep_clone();
        copy.get_indexed_table("NOTES")
            .expect("Table should exist")
            .put_entry(Note::new("Two", "").into())
            .expect("Put failed");
        copy.increment_commit_count();

        assert_eq!(files.len(), 1);
        assert_eq!(index.commit_count(), 1);
        assert_eq!(copy.commit_count(), 2);
        assert!(!copy.is_empty());
    }
}
