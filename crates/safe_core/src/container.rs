//! The single on-disk file holding every encrypted entry.
//!
//! A container is a plain tar archive of named entries. A zero-length file is
//! a valid container with nothing in it yet. Containers are never edited in
//! place: a [`ContainerWriter`] stages a complete replacement next to the
//! target and renames it over the original once it is synced.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tar::{Archive, Builder, Header};
use tempfile::NamedTempFile;

use crate::types::{SafeError, SafeResult};

const ENTRY_MODE: u32 = 0o600;

/// Create an empty container at `path` if nothing exists there yet
pub fn ensure_exists(path: &Path) -> SafeResult<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    File::create(path)?;
    tracing::debug!(path = %path.display(), "created empty container");
    Ok(())
}

/// Whether the container at `path` is missing or has zero length
pub fn is_empty(path: &Path) -> SafeResult<bool> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.len() == 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

/// Read the entry called `name`, `None` when the container has no such entry
pub fn read_entry(path: &Path, name: &str) -> SafeResult<Option<Vec<u8>>> {
    if is_empty(path)? {
        return Ok(None);
    }

    let mut archive = Archive::new(File::open(path)?);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == name {
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// Names of every entry in the container
pub fn entry_names(path: &Path) -> SafeResult<Vec<String>> {
    if is_empty(path)? {
        return Ok(Vec::new());
    }

    let mut archive = Archive::new(File::open(path)?);
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Stages a replacement container and atomically swaps it into place
pub struct ContainerWriter {
    builder: Builder<NamedTempFile>,
    target: PathBuf,
    written: HashSet<String>,
}

impl ContainerWriter {
    /// Start a new container that will replace `target` on [`commit`](Self::commit)
    pub fn new(target: &Path) -> SafeResult<Self> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Same directory as the target so the final rename cannot cross filesystems
        let staging = NamedTempFile::new_in(&parent)?;
        Ok(Self {
            builder: Builder::new(staging),
            target: target.to_path_buf(),
            written: HashSet::new(),
        })
    }

    /// Append an entry called `name`
    pub fn append(&mut self, name: &str, data: &[u8]) -> SafeResult<()> {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(0);
        self.builder.append_data(&mut header, name, data)?;
        self.written.insert(name.to_string());
        Ok(())
    }

    /// Copy the named entries verbatim from the container at `source`.
    ///
    /// Returns the names that were wanted but not found there.
    pub fn copy_from(&mut self, source: &Path, names: &HashSet<String>) -> SafeResult<Vec<String>> {
        let mut missing: HashSet<String> = names.clone();
        if names.is_empty() || is_empty(source)? {
            return Ok(missing.into_iter().collect());
        }

        let mut archive = Archive::new(File::open(source)?);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            if !missing.remove(&name) || self.written.contains(&name) {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            self.append(&name, &data)?;
        }
        Ok(missing.into_iter().collect())
    }

    /// Finish the archive, flush it to disk and rename it over the target
    pub fn commit(self) -> SafeResult<()> {
        let staging = self.builder.into_inner()?;
        staging.as_file().sync_all()?;
        staging
            .persist(&self.target)
            .map_err(|e| SafeError::StorageIo(e.error))?;
        tracing::debug!(path = %self.target.display(), entries = self.written.len(), "container replaced");
        Ok(())
    }
}
