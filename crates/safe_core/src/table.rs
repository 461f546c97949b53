//! In-memory tables persisted inside the master index.
//!
//! Every table serializes its mutations behind a single `parking_lot`
//! lock; readers take the shared side. Lookups return clones so no lock is
//! held once a call returns.

use std::collections::HashMap;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{SafeError, SafeResult};

/// A record that can be stored in a table
pub trait TableEntry: Clone + Send + Sync {
    /// Identifier assigned by the owning table, `None` until first stored
    fn id(&self) -> Option<u64>;

    fn set_id(&mut self, id: u64);
}

/// A record with a secondary, case-insensitive lookup key
pub trait IndexedTableEntry: TableEntry {
    /// Lookup key for this entry, `None` when the entry cannot be indexed
    fn index_id(&self) -> Option<String>;
}

/// Map of id to entry.
///
/// Entries stored without an id receive one greater than the largest id in
/// the table. Entries that already carry an id replace whatever is stored
/// under it.
pub struct MapTable<T> {
    name: String,
    entries: RwLock<HashMap<u64, T>>,
}

impl<T: TableEntry> MapTable<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a table from previously stored entries, keyed by their ids
    pub fn from_entries(name: impl Into<String>, entries: Vec<T>) -> Self {
        let table = Self::new(name);
        {
            let mut map = table.entries.write();
            for entry in entries {
                if let Some(id) = entry.id() {
                    map.insert(id, entry);
                }
            }
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `entry`, assigning an id when it has none, and return the id
    pub fn put_entry(&self, mut entry: T) -> u64 {
        let mut entries = self.entries.write();
        let id = match entry.id() {
            Some(id) => id,
            None => {
                let id = entries.keys().max().map_or(1, |max| max + 1);
                entry.set_id(id);
                id
            }
        };
        entries.insert(id, entry);
        id
    }

    pub fn get_entry(&self, id: u64) -> Option<T> {
        self.entries.read().get(&id).cloned()
    }

    /// Snapshot of every entry, in no particular order
    pub fn get_all(&self) -> Vec<T> {
        self.entries.read().values().cloned().collect()
    }

    pub fn remove_entry(&self, id: u64) -> Option<T> {
        self.entries.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Apply `update` to the entry stored under `id`, if any
    pub fn update_entry<F>(&self, id: u64, update: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.entries.write().get_mut(&id) {
            Some(entry) => {
                update(entry);
                true
            }
            None => false,
        }
    }
}

impl<T: TableEntry> Clone for MapTable<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            entries: RwLock::new(self.entries.read().clone()),
        }
    }
}

impl<T> std::fmt::Debug for MapTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapTable")
            .field("name", &self.name)
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

/// A [`MapTable`] with a lower-cased secondary index
pub struct IndexedMapTable<T> {
    table: MapTable<T>,
    // Write side doubles as the mutation lock for the whole table
    index: RwLock<HashMap<String, u64>>,
}

impl<T: IndexedTableEntry> IndexedMapTable<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: MapTable::new(name),
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a table and its index from previously stored entries
    pub fn from_entries(name: impl Into<String>, entries: Vec<T>) -> Self {
        let mut index = HashMap::new();
        for entry in &entries {
            if let (Some(id), Some(key)) = (entry.id(), entry.index_id()) {
                index.insert(key.to_lowercase(), id);
            }
        }
        Self {
            table: MapTable::from_entries(name, entries),
            index: RwLock::new(index),
        }
    }

    pub fn name(&self) -> &str {
        self.table.name()
    }

    /// Store `entry` and index it under its lower-cased index id.
    ///
    /// Fails with [`SafeError::MissingIndexKey`] when the entry has no
    /// index id; nothing is stored in that case.
    pub fn put_entry(&self, entry: T) -> SafeResult<u64> {
        let key = entry
            .index_id()
            .ok_or(SafeError::MissingIndexKey)?
            .to_lowercase();

        let mut index = self.index.write();
        let id = self.table.put_entry(entry);
        // A renamed entry must not stay reachable under its old key
        index.retain(|_, existing| *existing != id);
        index.insert(key, id);
        Ok(id)
    }

    pub fn get_entry(&self, id: u64) -> Option<T> {
        self.table.get_entry(id)
    }

    /// Case-insensitive lookup by index id
    pub fn get_by_index(&self, key: &str) -> Option<T> {
        let id = *self.index.read().get(&key.to_lowercase())?;
        self.table.get_entry(id)
    }

    pub fn get_all(&self) -> Vec<T> {
        self.table.get_all()
    }

    pub fn remove_by_index(&self, key: &str) -> Option<T> {
        let mut index = self.index.write();
        let id = index.remove(&key.to_lowercase())?;
        self.table.remove_entry(id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub(crate) fn update_entry<F>(&self, id: u64, update: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let _guard = self.index.write();
        self.table.update_entry(id, update)
    }
}

impl<T: IndexedTableEntry> Clone for IndexedMapTable<T> {
    fn clone(&self) -> Self {
        let index = self.index.read();
        Self {
            table: self.table.clone(),
            index: RwLock::new(index.clone()),
        }
    }
}

impl<T> std::fmt::Debug for IndexedMapTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedMapTable")
            .field("table", &self.table)
            .field("keys", &self.index.read().len())
            .finish()
    }
}

/// Metadata for a file stored in the container.
///
/// While `source_path` is set the bytes still live on disk and will be
/// copied into the container on the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTableEntry {
    pub(crate) id: Option<u64>,
    pub(crate) file_name: String,
    pub(crate) content_key: String,
    pub(crate) size: u64,
    pub(crate) source_path: Option<PathBuf>,
    pub(crate) message: Option<String>,
}

impl FileTableEntry {
    /// Describe the file at `path`, ready to be copied in on commit
    pub fn attach(path: &Path, message: Option<String>) -> SafeResult<Self> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(SafeError::NotFound(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| SafeError::NotFound(path.display().to_string()))?;

        Ok(Self {
            id: None,
            file_name,
            content_key: Uuid::new_v4().to_string(),
            size: metadata.len(),
            source_path: Some(path.to_path_buf()),
            message,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Name of the container entry holding the encrypted bytes
    pub fn content_key(&self) -> &str {
        &self.content_key
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_attached(&self) -> bool {
        self.source_path.is_some()
    }

    pub fn detach(&mut self) {
        self.source_path = None;
    }
}

impl TableEntry for FileTableEntry {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}

impl IndexedTableEntry for FileTableEntry {
    fn index_id(&self) -> Option<String> {
        Some(self.file_name.to_lowercase())
    }
}

/// Indexed table of files keyed by lower-cased file name
#[derive(Debug, Clone)]
pub struct FileTable {
    cryptic_name: String,
    table: IndexedMapTable<FileTableEntry>,
}

impl FileTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            cryptic_name: Uuid::new_v4().to_string(),
            table: IndexedMapTable::new(name),
        }
    }

    pub(crate) fn from_parts(
        name: impl Into<String>,
        cryptic_name: String,
        entries: Vec<FileTableEntry>,
    ) -> Self {
        Self {
            cryptic_name,
            table: IndexedMapTable::from_entries(name, entries),
        }
    }

    /// Random name assigned when the table was created
    pub fn cryptic_name(&self) -> &str {
        &self.cryptic_name
    }

    /// Entries whose bytes have not been committed yet
    pub fn attached_entries(&self) -> Vec<FileTableEntry> {
        self.table
            .get_all()
            .into_iter()
            .filter(FileTableEntry::is_attached)
            .collect()
    }

    /// Drop the source path of entry `id`, returning whether it existed
    pub fn detach(&self, id: u64) -> bool {
        self.table.update_entry(id, FileTableEntry::detach)
    }
}

impl Deref for FileTable {
    type Target = IndexedMapTable<FileTableEntry>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: Option<u64>,
        key: Option<String>,
    }

    impl Item {
        fn new(key: &str) -> Self {
            Self {
                id: None,
                key: Some(key.to_string()),
            }
        }
    }

    impl TableEntry for Item {
        fn id(&self) -> Option<u64> {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = Some(id);
        }
    }

    impl IndexedTableEntry for Item {
        fn index_id(&self) -> Option<String> {
            self.key.clone()
        }
    }

    #[test]
    fn test_id_assignment() {
        let table = MapTable::new("items");
        assert_eq!(table.put_entry(Item::new("a")), 1);
        assert_eq!(table.put_entry(Item::new("b")), 2);
        assert_eq!(table.put_entry(Item::new("c")), 3);

        let stored = table.get_entry(2).expect("Entry 2 should exist");
        assert_eq!(stored.id, Some(2));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_ids_not_reused_after_gap() {
        let table = MapTable::new("items");
        table.put_entry(Item::new("a"));
        table.put_entry(Item::new("b"));
        table.put_entry(Item::new("c"));
        table.remove_entry(1);

        // max + 1, never a recycled id
        assert_eq!(table.put_entry(Item::new("d")), 4);
    }

    #[test]
    fn test_put_with_id_overwrites() {
        let table = MapTable::new("items");
        let id = table.put_entry(Item::new("a"));

        let mut replacement = Item::new("z");
        replacement.id = Some(id);
        assert_eq!(table.put_entry(replacement), id);

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get_entry(id).and_then(|item| item.key),
            Some("z".to_string())
        );
    }

    #[test]
    fn test_empty_table() {
        let table: MapTable<Item> = MapTable::new("empty");
        assert!(table.is_empty());
        assert!(table.get_all().is_empty());
        assert!(table.get_entry(1).is_none());
        assert_eq!(table.name(), "empty");
    }

    #[test]
    fn test_case_insensitive_index() {
        let table = IndexedMapTable::new("indexed");
        table.put_entry(Item::new("Foo")).expect("Put failed");

        assert!(table.get_by_index("foo").is_some());
        assert!(table.get_by_index("FOO").is_some());
        assert!(table.get_by_index("bar").is_none());
    }

    #[test]
    fn test_missing_index_key() {
        let table = IndexedMapTable::new("indexed");
        let item = Item { id: None, key: None };
        assert!(matches!(
            table.put_entry(item),
            Err(SafeError::MissingIndexKey)
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_renamed_entry_reindexed() {
        let table = IndexedMapTable::new("indexed");
        let id = table.put_entry(Item::new("old")).expect("Put failed");

        let mut renamed = Item::new("new");
        renamed.id = Some(id);
        table.put_entry(renamed).expect("Put failed");

        assert!(table.get_by_index("old").is_none());
        assert_eq!(table.get_by_index("NEW").and_then(|i| i.id), Some(id));
    }

    #[test]
    fn test_remove_by_index() {
        let table = IndexedMapTable::new("indexed");
        table.put_entry(Item::new("gone")).expect("Put failed");
        assert!(table.remove_by_index("Gone").is_some());
        assert!(table.is_empty());
        assert!(table.get_by_index("gone").is_none());
    }

    #[test]
    fn test_rebuild_from_entries() {
        let table = IndexedMapTable::new("indexed");
        table.put_entry(Item::new("one")).expect("Put failed");
        table.put_entry(Item::new("Two")).expect("Put failed");

        let rebuilt = IndexedMapTable::from_entries("indexed", table.get_all());
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.get_by_index("two").and_then(|i| i.id), Some(2));
        assert_eq!(rebuilt.put_entry(Item::new("three")).expect("Put failed"), 3);
    }

    #[test]
    fn test_file_entry_attach_and_detach() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("Report.PDF");
        let mut file = fs::File::create(&path).expect("Failed to create file");
        file.write_all(&[7u8; 100]).expect("Failed to write file");

        let table = FileTable::new("FILES");
        let entry = FileTableEntry::attach(&path, Some("quarterly".into()))
            .expect("Attach failed");
        assert_eq!(entry.size(), 100);
        assert_eq!(entry.file_name(), "Report.PDF");
        assert!(Uuid::parse_str(entry.content_key()).is_ok());

        let id = table.put_entry(entry).expect("Put failed");
        assert_eq!(table.attached_entries().len(), 1);
        assert!(table.get_by_index("report.pdf").is_some());

        assert!(table.detach(id));
        assert!(table.attached_entries().is_empty());
        let detached = table.get_entry(id).expect("Entry should exist");
        assert!(!detached.is_attached());
        assert_eq!(detached.message(), Some("quarterly"));
    }

    #[test]
    fn test_attach_missing_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let result = FileTableEntry::attach(&dir.path().join("absent"), None);
        assert!(matches!(result, Err(SafeError::StorageIo(_))));

        let result = FileTableEntry::attach(dir.path(), None);
        assert!(matches!(result, Err(SafeError::NotFound(_))));
    }

    #[test]
    fn test_file_tables_get_distinct_cryptic_names() {
        let a = FileTable::new("FILES");
        let b = FileTable::new("FILES");
        assert_ne!(a.cryptic_name(), b.cryptic_name());
    }
}
