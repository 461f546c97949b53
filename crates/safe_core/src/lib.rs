//! # DigitalSafe Core
//!
//! A local, passphrase protected store for notes, passwords and files. All
//! data lives in a single container file; nothing is written to it in the
//! clear.
//!
//! ## Security Design
//!
//! - The passphrase is stretched with a walled, iterated SHA-256 hash and
//!   only the 512-bit result is kept, in locked memory that is zeroed on
//!   release and cleared automatically after a configurable idle period.
//! - Every stored payload passes through three AES-128-CBC layers, each with
//!   its own PBKDF2-HMAC-SHA512 key and hash-derived IV.
//! - A redundant padding scheme rejects wrong keys and most tampering.
//! - The container is replaced atomically on every commit, so a crash never
//!   leaves a half-written safe behind.
//!
//! ## Usage Example
//!
//! ```no_run
//! use digital_safe_core::{DigitalSafe, Note};
//!
//! let safe = DigitalSafe::open("digitalSafe.safe").unwrap();
//! safe.set_passphrase("CorrectHorse1").unwrap();
//!
//! safe.put_note(Note::new("hello", "world")).unwrap();
//! let note = safe.get_note("HELLO").unwrap().unwrap();
//! assert_eq!(note.message(), "world");
//!
//! safe.lock();
//! ```

// Unsafe code is limited to the memory locking calls in `memory`
#![deny(unsafe_code)]

/// Container settings and defaults
pub mod config;

/// Versioned binary encoding of the master index
pub mod codec;

/// The tar archive backing a safe
pub mod container;

/// Layered AES-128-CBC encryption keyed by the passphrase hash
pub mod crypto;

/// Encrypted persistence of the master index and file blobs
pub mod database;

/// One-way passphrase hashing
pub mod hash;

/// Root registry of every table in a safe
pub mod master_index;

/// Locked, zero-on-drop buffers for secret material
pub mod memory;

/// Note, password and blob records
pub mod notes;

/// Time-limited passphrase holder
pub mod passphrase;

/// The facade used by front ends
pub mod safe;

/// Generic id and index keyed tables
pub mod table;

/// Error type and shared constants
pub mod types;

pub use codec::{decode_index, encode_index, INDEX_FORMAT_VERSION};
pub use config::SafeConfig;
pub use crypto::LayeredCipher;
pub use database::SecureDatabase;
pub use master_index::MasterIndex;
pub use memory::SecureBytes;
pub use notes::{Blob, Note, PasswordNote, Record};
pub use passphrase::Passphrase;
pub use safe::{DigitalSafe, FileListing};
pub use table::{
    FileTable, FileTableEntry, IndexedMapTable, IndexedTableEntry, MapTable, TableEntry,
};
pub use types::{SafeError, SafeResult};
