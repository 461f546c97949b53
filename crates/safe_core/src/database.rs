//! Encrypted persistence of the master index and committed file blobs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::{decode_index, encode_index};
use crate::container::{self, ContainerWriter};
use crate::crypto::LayeredCipher;
use crate::master_index::MasterIndex;
use crate::passphrase::Passphrase;
use crate::table::{FileTableEntry, TableEntry};
use crate::types::{SafeError, SafeResult, MASTER_INDEX_ENTRY};

/// A container file plus the passphrase that unlocks it.
///
/// Every read goes to disk; nothing decrypted is cached between calls.
#[derive(Debug)]
pub struct SecureDatabase {
    passphrase: Passphrase,
    path: PathBuf,
}

impl SecureDatabase {
    /// Open the container at `path`, creating an empty one if needed
    pub fn open(path: impl Into<PathBuf>) -> SafeResult<Self> {
        Self::with_passphrase(path, Passphrase::new())
    }

    /// Open with a custom passphrase lifetime
    pub fn with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> SafeResult<Self> {
        Self::with_passphrase(path, Passphrase::with_ttl(ttl))
    }

    fn with_passphrase(path: impl Into<PathBuf>, passphrase: Passphrase) -> SafeResult<Self> {
        let path = path.into();
        container::ensure_exists(&path)?;
        Ok(Self { passphrase, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn passphrase(&self) -> &Passphrase {
        &self.passphrase
    }

    /// Accept `raw` as the passphrase.
    ///
    /// Any valid passphrase is accepted for an empty container. Otherwise the
    /// master index must decrypt under it; if not, the holder is locked again
    /// and [`SafeError::InvalidPassphrase`] is returned.
    pub fn set_passphrase(&self, raw: &str) -> SafeResult<()> {
        self.passphrase.set_passphrase(raw)?;
        if self.is_empty()? {
            return Ok(());
        }

        match self.get_master_index() {
            Ok(_) => Ok(()),
            Err(e) => {
                self.lock();
                tracing::warn!(error = %e, "passphrase did not unlock the safe, locked again");
                Err(e)
            }
        }
    }

    pub fn lock(&self) {
        self.passphrase.clear();
    }

    pub fn is_locked(&self) -> bool {
        self.passphrase.is_locked()
    }

    /// Whether the container holds no data yet
    pub fn is_empty(&self) -> SafeResult<bool> {
        container::is_empty(&self.path)
    }

    /// Delete everything and start over with an empty container
    pub fn clear(&self) -> SafeResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        container::ensure_exists(&self.path)?;
        tracing::info!(path = %self.path.display(), "safe cleared");
        Ok(())
    }

    /// Load and decrypt the master index.
    ///
    /// An empty container yields a fresh index without touching the
    /// passphrase. A failed decryption or decode is reported as
    /// [`SafeError::InvalidPassphrase`].
    pub fn get_master_index(&self) -> SafeResult<MasterIndex> {
        container::ensure_exists(&self.path)?;
        if self.is_empty()? {
            return Ok(MasterIndex::new());
        }

        let cipher = LayeredCipher::from_passphrase(&self.passphrase)?;
        let encrypted = container::read_entry(&self.path, MASTER_INDEX_ENTRY)?
            .ok_or_else(|| SafeError::MissingEntry(MASTER_INDEX_ENTRY.to_string()))?;

        let decoded = cipher.decrypt(&encrypted).and_then(|plain| decode_index(&plain));
        match decoded {
            Ok(index) => {
                tracing::debug!(commits = index.commit_count(), "master index loaded");
                Ok(index)
            }
            Err(SafeError::PaddingInvalid) | Err(SafeError::Codec(_)) => {
                Err(SafeError::InvalidPassphrase)
            }
            Err(e) => Err(e),
        }
    }

    /// Persist `index` and every file still attached to it.
    ///
    /// A replacement container is staged beside the current one: newly
    /// attached files are read and encrypted into it, blobs committed earlier
    /// are copied across unchanged, then the encrypted index is written and
    /// the file is renamed into place. Only after that succeeds are the new
    /// entries detached and the commit counter advanced on `index`.
    pub fn commit_master_index(&self, index: &MasterIndex) -> SafeResult<()> {
        let cipher = LayeredCipher::from_passphrase(&self.passphrase)?;

        // Work on a copy so a failure leaves `index` untouched
        let staged = index.deep_clone();
        let mut writer = ContainerWriter::new(&self.path)?;
        let mut carried = HashSet::new();
        let mut detached: Vec<(String, u64)> = Vec::new();

        for table in staged.file_tables() {
            tracing::debug!(table = table.name(), "committing file table");
            for entry in table.get_all() {
                match entry.source_path() {
                    Some(source) => {
                        tracing::debug!(file = entry.file_name(), "committing file");
                        let bytes = fs::read(source)?;
                        writer.append(entry.content_key(), &cipher.encrypt(&bytes)?)?;
                        if let Some(id) = entry.id() {
                            table.detach(id);
                            detached.push((table.name().to_string(), id));
                        }
                    }
                    None => {
                        carried.insert(entry.content_key().to_string());
                    }
                }
            }
        }

        let missing = writer.copy_from(&self.path, &carried)?;
        for key in &missing {
            tracing::warn!(content_key = %key, "committed file blob missing from container");
        }

        let count = staged.increment_commit_count();
        let encrypted_index = cipher.encrypt(&encode_index(&staged)?)?;
        writer.append(MASTER_INDEX_ENTRY, &encrypted_index)?;
        writer.commit()?;

        for (table_name, id) in detached {
            if let Some(table) = index.get_file_table(&table_name) {
                table.detach(id);
            }
        }
        index.set_commit_count(count);
        tracing::debug!(commits = count, "master index committed");
        Ok(())
    }

    /// Decrypt the committed bytes of `entry`.
    ///
    /// An entry whose source is still attached has not been committed, so
    /// its bytes are read from the source file instead.
    pub fn load_file(&self, entry: &FileTableEntry) -> SafeResult<Vec<u8>> {
        if let Some(source) = entry.source_path() {
            return Ok(fs::read(source)?);
        }

        let cipher = LayeredCipher::from_passphrase(&self.passphrase)?;
        let encrypted = container::read_entry(&self.path, entry.content_key())?
            .ok_or_else(|| SafeError::MissingEntry(entry.content_key().to_string()))?;
        cipher.decrypt(&encrypted)
    }
}
