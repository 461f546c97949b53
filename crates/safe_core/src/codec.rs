//! Binary encoding of the master index.
//!
//! Layout: `b"DSIDX"`, a big-endian `u16` format version, then a bincode
//! body made of the wire records below. The wire records are kept separate
//! from the in-memory types so either side can change without silently
//! altering the stored format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::master_index::MasterIndex;
use crate::notes::{Blob, Note, PasswordNote, Record};
use crate::table::{FileTable, FileTableEntry, IndexedMapTable, MapTable, TableEntry};
use crate::types::{SafeError, SafeResult};

/// Leading bytes of every encoded index
pub const INDEX_MAGIC: &[u8; 5] = b"DSIDX";

/// Current encoding version
pub const INDEX_FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = INDEX_MAGIC.len() + 2;

#[derive(Serialize, Deserialize)]
struct WireIndex {
    commit_count: u64,
    map_tables: Vec<WireTable>,
    indexed_tables: Vec<WireTable>,
    file_tables: Vec<WireFileTable>,
}

#[derive(Serialize, Deserialize)]
struct WireTable {
    name: String,
    records: Vec<WireRecord>,
}

#[derive(Serialize, Deserialize)]
struct WireFileTable {
    name: String,
    cryptic_name: String,
    entries: Vec<WireFileEntry>,
}

#[derive(Serialize, Deserialize)]
enum WireRecord {
    Note(WireNote),
    PasswordNote(WirePasswordNote),
    Blob(WireBlob),
}

#[derive(Serialize, Deserialize)]
struct WireNote {
    id: Option<u64>,
    title: String,
    message: String,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct WirePasswordNote {
    note: WireNote,
    username: String,
    password: String,
    url: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct WireBlob {
    id: Option<u64>,
    name: String,
    data: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireFileEntry {
    id: Option<u64>,
    file_name: String,
    content_key: String,
    size: u64,
    source_path: Option<PathBuf>,
    message: Option<String>,
}

impl From<&Note> for WireNote {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            message: note.message.clone(),
            tags: note.tags.iter().cloned().collect(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

impl From<WireNote> for Note {
    fn from(wire: WireNote) -> Self {
        Self {
            id: wire.id,
            title: wire.title,
            message: wire.message,
            tags: wire.tags.into_iter().collect(),
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        }
    }
}

impl From<&Record> for WireRecord {
    fn from(record: &Record) -> Self {
        match record {
            Record::Note(note) => WireRecord::Note(note.into()),
            Record::PasswordNote(entry) => WireRecord::PasswordNote(WirePasswordNote {
                note: (&entry.note).into(),
                username: entry.username.clone(),
                password: entry.password.clone(),
                url: entry.url.clone(),
                expires_at: entry.expires_at,
            }),
            Record::Blob(blob) => WireRecord::Blob(WireBlob {
                id: blob.id,
                name: blob.name.clone(),
                data: blob.data.clone(),
            }),
        }
    }
}

impl From<WireRecord> for Record {
    fn from(wire: WireRecord) -> Self {
        match wire {
            WireRecord::Note(note) => Record::Note(note.into()),
            WireRecord::PasswordNote(entry) => Record::PasswordNote(PasswordNote {
                note: entry.note.into(),
                username: entry.username,
                password: entry.password,
                url: entry.url,
                expires_at: entry.expires_at,
            }),
            WireRecord::Blob(blob) => Record::Blob(Blob {
                id: blob.id,
                name: blob.name,
                data: blob.data,
            }),
        }
    }
}

impl From<&FileTableEntry> for WireFileEntry {
    fn from(entry: &FileTableEntry) -> Self {
        Self {
            id: entry.id,
            file_name: entry.file_name.clone(),
            content_key: entry.content_key.clone(),
            size: entry.size,
            source_path: entry.source_path.clone(),
            message: entry.message.clone(),
        }
    }
}

impl From<WireFileEntry> for FileTableEntry {
    fn from(wire: WireFileEntry) -> Self {
        Self {
            id: wire.id,
            file_name: wire.file_name,
            content_key: wire.content_key,
            size: wire.size,
            source_path: wire.source_path,
            message: wire.message,
        }
    }
}

fn wire_records(mut records: Vec<Record>) -> Vec<WireRecord> {
    records.sort_by_key(|record| record.id());
    records.iter().map(WireRecord::from).collect()
}

/// Encode `index` into its versioned binary form
pub fn encode_index(index: &MasterIndex) -> SafeResult<Vec<u8>> {
    let mut map_tables: Vec<WireTable> = index
        .map_tables()
        .iter()
        .map(|table| WireTable {
            name: table.name().to_string(),
            records: wire_records(table.get_all()),
        })
        .collect();
    map_tables.sort_by(|a, b| a.name.cmp(&b.name));

    let mut indexed_tables: Vec<WireTable> = index
        .indexed_tables()
        .iter()
        .map(|table| WireTable {
            name: table.name().to_string(),
            records: wire_records(table.get_all()),
        })
        .collect();
    indexed_tables.sort_by(|a, b| a.name.cmp(&b.name));

    let mut file_tables: Vec<WireFileTable> = index
        .file_tables()
        .iter()
        .map(|table| {
            let mut entries = table.get_all();
            entries.sort_by_key(|entry| entry.id);
            WireFileTable {
                name: table.name().to_string(),
                cryptic_name: table.cryptic_name().to_string(),
                entries: entries.iter().map(WireFileEntry::from).collect(),
            }
        })
        .collect();
    file_tables.sort_by(|a, b| a.name.cmp(&b.name));

    let wire = WireIndex {
        commit_count: index.commit_count(),
        map_tables,
        indexed_tables,
        file_tables,
    };

    let body = bincode::serialize(&wire)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode bytes produced by [`encode_index`].
///
/// Fails with [`SafeError::Codec`] on a bad header, an unknown version or a
/// malformed body.
pub fn decode_index(bytes: &[u8]) -> SafeResult<MasterIndex> {
    if bytes.len() < HEADER_LEN || &bytes[..INDEX_MAGIC.len()] != INDEX_MAGIC {
        return Err(SafeError::Codec("missing index header".into()));
    }

    let version = u16::from_be_bytes([bytes[INDEX_MAGIC.len()], bytes[INDEX_MAGIC.len() + 1]]);
    if version != INDEX_FORMAT_VERSION {
        return Err(SafeError::Codec(format!(
            "unsupported index version {}",
            version
        )));
    }

    let wire: WireIndex = bincode::deserialize(&bytes[HEADER_LEN..])?;

    let index = MasterIndex::new();
    index.set_commit_count(wire.commit_count);
    for table in wire.map_tables {
        let records = table.records.into_iter().map(Record::from).collect();
        index.put_map_table(MapTable::from_entries(table.name, records));
    }
    for table in wire.indexed_tables {
        let records = table.records.into_iter().map(Record::from).collect();
        index.put_indexed_table(IndexedMapTable::from_entries(table.name, records));
    }
    for table in wire.file_tables {
        let entries = table.entries.into_iter().map(FileTableEntry::from).collect();
        index.put_file_table(FileTable::from_parts(table.name, table.cryptic_name, entries));
    }
    Ok(index)
}
