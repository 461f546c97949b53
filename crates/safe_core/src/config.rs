use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{SafeError, SafeResult, DEFAULT_PASSPHRASE_TTL_SECS, DEFAULT_SAFE_FILE_NAME};

/// Settings for opening a [`DigitalSafe`](crate::DigitalSafe)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeConfig {
    /// Location of the container file
    pub path: PathBuf,

    /// How long an accepted passphrase stays in memory
    pub passphrase_ttl: Duration,

    /// Indexed table holding notes
    pub notes_table: String,

    /// Indexed table holding password entries
    pub passwords_table: String,

    /// File table holding stored files
    pub files_table: String,
}

impl SafeConfig {
    /// Defaults with the container at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.passphrase_ttl = ttl;
        self
    }

    pub fn passphrase_ttl(&self) -> Duration {
        self.passphrase_ttl
    }

    /// Reject settings a safe cannot be opened with.
    ///
    /// A zero lifetime would expire the passphrase before the first commit.
    pub fn validate(&self) -> SafeResult<()> {
        if self.passphrase_ttl.is_zero() {
            return Err(SafeError::InvalidConfig(
                "passphrase lifetime must be greater than zero".to_string(),
            ));
        }
        let tables = [&self.notes_table, &self.passwords_table, &self.files_table];
        if tables.iter().any(|name| name.is_empty()) {
            return Err(SafeError::InvalidConfig(
                "table names must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SafeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SAFE_FILE_NAME),
            passphrase_ttl: Duration::from_secs(DEFAULT_PASSPHRASE_TTL_SECS),
            notes_table: "NOTES".to_string(),
            passwords_table: "PASSWORDS".to_string(),
            files_table: "FILES".to_string(),
        }
    }
}
