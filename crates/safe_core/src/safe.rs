//! High level entry point used by front ends.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::SafeConfig;
use crate::database::SecureDatabase;
use crate::master_index::MasterIndex;
use crate::notes::{Note, PasswordNote, Record};
use crate::table::{FileTable, FileTableEntry, IndexedMapTable, IndexedTableEntry, TableEntry};
use crate::types::{SafeError, SafeResult};

/// Summary of a stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileListing {
    pub name: String,
    pub content_key: String,
    pub size: u64,
}

impl From<&FileTableEntry> for FileListing {
    fn from(entry: &FileTableEntry) -> Self {
        Self {
            name: entry.file_name().to_string(),
            content_key: entry.content_key().to_string(),
            size: entry.size(),
        }
    }
}

impl fmt::Display for FileListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {} bytes.", self.name, self.content_key, self.size)
    }
}

/// A passphrase protected store of notes, passwords and files.
///
/// Every mutating call loads the master index, applies the change and
/// commits it before returning. Those cycles are serialized, so one
/// `DigitalSafe` may be shared between threads.
pub struct DigitalSafe {
    config: SafeConfig,
    database: SecureDatabase,
    write_lock: Mutex<()>,
}

impl DigitalSafe {
    /// Open the safe stored at `path` with default settings
    pub fn open(path: impl Into<PathBuf>) -> SafeResult<Self> {
        Self::with_config(SafeConfig::new(path))
    }

    /// Open the safe described by `config`.
    ///
    /// Fails with [`SafeError::InvalidConfig`] for a zero passphrase lifetime.
    pub fn with_config(config: SafeConfig) -> SafeResult<Self> {
        config.validate()?;
        let database = SecureDatabase::with_ttl(config.path.clone(), config.passphrase_ttl())?;
        Ok(Self {
            config,
            database,
            write_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &SafeConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        self.database.path()
    }

    /// Unlock the safe, creating its tables if the container is empty.
    ///
    /// Fails with [`SafeError::InvalidPassphrase`] when `raw` is too short or
    /// does not open the existing container.
    pub fn set_passphrase(&self, raw: &str) -> SafeResult<()> {
        let _guard = self.write_lock.lock();
        self.database.set_passphrase(raw)?;

        if self.database.is_empty()? {
            let index = self.load_index()?;
            self.database.commit_master_index(&index)?;
            tracing::info!(path = %self.path().display(), "initialized new safe");
        }
        Ok(())
    }

    pub fn lock(&self) {
        self.database.lock();
    }

    pub fn is_locked(&self) -> bool {
        self.database.is_locked()
    }

    /// Erase every stored record. The passphrase, if any, stays set.
    pub fn clear(&self) -> SafeResult<()> {
        let _guard = self.write_lock.lock();
        self.database.clear()
    }

    /// Store `note`, replacing any note with the same title
    pub fn put_note(&self, note: Note) -> SafeResult<u64> {
        let name = self.config.notes_table.clone();
        self.put_indexed(&name, note)
    }

    /// Look a note up by title, ignoring case
    pub fn get_note(&self, title: &str) -> SafeResult<Option<Note>> {
        let index = self.load_index()?;
        Ok(self
            .indexed_table(&index, &self.config.notes_table)?
            .get_by_index(title)
            .and_then(Record::into_note))
    }

    /// Store `entry`, replacing any password entry with the same title
    pub fn put_password_note(&self, entry: PasswordNote) -> SafeResult<u64> {
        let name = self.config.passwords_table.clone();
        self.put_indexed(&name, entry)
    }

    /// Look a password entry up by title, ignoring case
    pub fn get_password_note(&self, title: &str) -> SafeResult<Option<PasswordNote>> {
        let index = self.load_index()?;
        Ok(self
            .indexed_table(&index, &self.config.passwords_table)?
            .get_by_index(title)
            .and_then(Record::into_password_note))
    }

    /// Notes whose full text contains `query`, ignoring case, sorted by title
    pub fn search_notes(&self, query: &str) -> SafeResult<Vec<Note>> {
        let index = self.load_index()?;
        let query = query.to_lowercase();
        let mut found: Vec<Note> = self
            .indexed_table(&index, &self.config.notes_table)?
            .get_all()
            .into_iter()
            .filter_map(Record::into_note)
            .filter(|note| note.full_text().to_lowercase().contains(&query))
            .collect();
        found.sort_by(|a, b| a.title().to_lowercase().cmp(&b.title().to_lowercase()));
        Ok(found)
    }

    /// Copy the file at `path` into the safe.
    ///
    /// A stored file with the same name, ignoring case, is replaced.
    pub fn put_file(&self, path: impl AsRef<Path>) -> SafeResult<FileListing> {
        self.put_file_with_message(path, None)
    }

    /// Copy the file at `path` into the safe with a free text message
    pub fn put_file_with_message(
        &self,
        path: impl AsRef<Path>,
        message: Option<String>,
    ) -> SafeResult<FileListing> {
        let _guard = self.write_lock.lock();
        let index = self.load_index()?;
        let table = self.file_table(&index)?;

        let mut entry = FileTableEntry::attach(path.as_ref(), message)?;
        if let Some(existing) = table.get_by_index(entry.file_name()).and_then(|e| e.id()) {
            entry.set_id(existing);
        }
        let listing = FileListing::from(&entry);

        table.put_entry(entry)?;
        self.database.commit_master_index(&index)?;
        tracing::debug!(file = %listing.name, size = listing.size, "file stored");
        Ok(listing)
    }

    /// Decrypted contents of the stored file called `name`
    pub fn get_file(&self, name: &str) -> SafeResult<Vec<u8>> {
        let index = self.load_index()?;
        let entry = self
            .file_table(&index)?
            .get_by_index(name)
            .ok_or_else(|| SafeError::NotFound(name.to_string()))?;
        self.database.load_file(&entry)
    }

    /// Write the stored file called `name` to `destination`, returning its size
    pub fn export_file(&self, name: &str, destination: impl AsRef<Path>) -> SafeResult<u64> {
        let bytes = self.get_file(name)?;
        fs::write(destination.as_ref(), &bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Every stored file, sorted by name
    pub fn list_files(&self) -> SafeResult<Vec<FileListing>> {
        let index = self.load_index()?;
        let mut listings: Vec<FileListing> = self
            .file_table(&index)?
            .get_all()
            .iter()
            .map(FileListing::from)
            .collect();
        listings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listings)
    }

    /// Number of commits made to this safe
    pub fn commit_count(&self) -> SafeResult<u64> {
        Ok(self.load_index()?.commit_count())
    }

    fn put_indexed<T>(&self, table_name: &str, entry: T) -> SafeResult<u64>
    where
        T: Into<Record>,
    {
        let _guard = self.write_lock.lock();
        let index = self.load_index()?;
        let table = self.indexed_table(&index, table_name)?;

        let mut record: Record = entry.into();
        if record.id().is_none() {
            let key = record.index_id().ok_or(SafeError::MissingIndexKey)?;
            if let Some(existing) = table.get_by_index(&key).and_then(|e| e.id()) {
                record.set_id(existing);
            }
        }

        let id = table.put_entry(record)?;
        self.database.commit_master_index(&index)?;
        Ok(id)
    }

    /// Load the index, registering any of the standard tables it lacks
    fn load_index(&self) -> SafeResult<MasterIndex> {
        if self.database.is_locked() {
            return Err(SafeError::PassphraseExpired);
        }

        let index = self.database.get_master_index()?;
        for name in [&self.config.notes_table, &self.config.passwords_table] {
            if index.get_indexed_table(name).is_none() {
                index.put_indexed_table(IndexedMapTable::new(name.as_str()));
            }
        }
        if index.get_file_table(&self.config.files_table).is_none() {
            index.put_file_table(FileTable::new(self.config.files_table.as_str()));
        }
        Ok(index)
    }

    fn indexed_table(
        &self,
        index: &MasterIndex,
        name: &str,
    ) -> SafeResult<Arc<IndexedMapTable<Record>>> {
        index
            .get_indexed_table(name)
            .ok_or_else(|| SafeError::MissingTable(name.to_string()))
    }

    fn file_table(&self, index: &MasterIndex) -> SafeResult<Arc<FileTable>> {
        index
            .get_file_table(&self.config.files_table)
            .ok_or_else(|| SafeError::MissingTable(self.config.files_table.clone()))
    }
}

impl fmt::Debug for DigitalSafe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalSafe")
            .field("path", &self.path())
            .field("locked", &self.is_locked())
            .finish()
    }
}
