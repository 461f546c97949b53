use std::io;
use thiserror::Error;

/// Minimum number of characters an accepted passphrase must have
pub const MINIMUM_PASSPHRASE_LENGTH: usize = 8;

/// Default number of seconds a passphrase hash stays in memory
pub const DEFAULT_PASSPHRASE_TTL_SECS: u64 = 10 * 60;

/// Default container file name
pub const DEFAULT_SAFE_FILE_NAME: &str = "digitalSafe.safe";

/// Reserved container entry holding the encrypted master index
pub const MASTER_INDEX_ENTRY: &str = "MASTER_INDEX";

/// Size in bytes of a passphrase hash
pub const PASSPHRASE_HASH_SIZE: usize = 64;

/// Errors surfaced by every fallible operation of the store.
///
/// Cryptographic failures are never folded into "empty" results: a wrong
/// passphrase and an empty store are always distinguishable.
#[derive(Error, Debug)]
pub enum SafeError {
    /// Passphrase too short, or it does not unlock an existing store
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// A secret was required but none is held (locked or expired)
    #[error("passphrase expired - unlock the safe first")]
    PassphraseExpired,

    /// Ciphertext failed the padding integrity check
    #[error("padding check failed - wrong key or corrupt data")]
    PaddingInvalid,

    /// An indexed entry was stored without an index string
    #[error("indexed entry has no index key")]
    MissingIndexKey,

    /// Filesystem or container I/O failure
    #[error("storage I/O error: {0}")]
    StorageIo(#[from] io::Error),

    /// The master index could not be encoded or decoded
    #[error("index codec error: {0}")]
    Codec(String),

    /// A named table is not registered in the master index
    #[error("table not found: {0}")]
    MissingTable(String),

    /// A container entry referenced by the index is absent
    #[error("container entry not found: {0}")]
    MissingEntry(String),

    /// A record looked up by name does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Settings a safe cannot be opened with
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Block cipher setup or processing failed
    #[error("cipher error: {0}")]
    Crypto(String),
}

impl From<bincode::Error> for SafeError {
    fn from(err: bincode::Error) -> Self {
        SafeError::Codec(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type SafeResult<T> = Result<T, SafeError>;
