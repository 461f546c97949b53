//! Text records kept in the safe.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::table::{IndexedTableEntry, TableEntry};

/// Separator accepted by [`Note::tag_with_tag_string`]
pub const TAG_DELIMITER: char = ',';

/// Days a password stays fresh after it was last changed
pub const PASSWORD_LIFETIME_DAYS: i64 = 180;

/// A titled text note with tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub(crate) id: Option<u64>,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title: title.into(),
            message: message.into(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.touch();
        self.title = title.into();
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.touch();
        self.message = message.into();
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Add a single tag, surrounding whitespace removed
    pub fn tag(&mut self, tag: &str) {
        self.touch();
        let tag = tag.trim();
        if !tag.is_empty() {
            self.tags.insert(tag.to_string());
        }
    }

    /// Remove a tag, returning whether it was present
    pub fn untag(&mut self, tag: &str) -> bool {
        if self.tags.remove(tag.trim()) {
            self.touch();
            true
        } else {
            false
        }
    }

    /// Replace every tag with the comma separated list in `tags`
    pub fn tag_with_tag_string(&mut self, tags: &str) {
        self.touch();
        self.tags = tags
            .split(TAG_DELIMITER)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
    }

    /// Tags joined with ", " in sorted order
    pub fn tag_string(&self) -> String {
        self.tags
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Title, tags, message and timestamps joined by spaces, for searching
    pub fn full_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.title,
            self.tag_string(),
            self.message,
            self.created_at.to_rfc3339(),
            self.updated_at.to_rfc3339()
        )
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl TableEntry for Note {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}

impl IndexedTableEntry for Note {
    fn index_id(&self) -> Option<String> {
        if self.title.is_empty() {
            None
        } else {
            Some(self.title.to_lowercase())
        }
    }
}

/// A note holding login credentials.
///
/// The expiration moves to 180 days from now whenever the password value
/// actually changes.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordNote {
    pub(crate) note: Note,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) url: String,
    pub(crate) expires_at: DateTime<Utc>,
}

impl PasswordNote {
    pub fn new(title: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            note: Note::new(title, ""),
            username: String::new(),
            password: password.into(),
            url: String::new(),
            expires_at: password_expiry(),
        }
    }

    /// The underlying note (title, message, tags, timestamps)
    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn note_mut(&mut self) -> &mut Note {
        &mut self.note
    }

    pub fn title(&self) -> &str {
        self.note.title()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.note.touch();
        self.username = username.into();
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        let password = password.into();
        self.note.touch();
        if password != self.password {
            self.expires_at = password_expiry();
        }
        self.password = password;
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.note.touch();
        self.url = url.into();
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        self.note.touch();
        self.expires_at = expires_at;
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// Never print the password
impl std::fmt::Debug for PasswordNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordNote")
            .field("note", &self.note)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TableEntry for PasswordNote {
    fn id(&self) -> Option<u64> {
        self.note.id
    }

    fn set_id(&mut self, id: u64) {
        self.note.id = Some(id);
    }
}

impl IndexedTableEntry for PasswordNote {
    fn index_id(&self) -> Option<String> {
        self.note.index_id()
    }
}

fn password_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::days(PASSWORD_LIFETIME_DAYS)
}

/// A named byte payload for general purpose tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub(crate) id: Option<u64>,
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
}

impl Blob {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: None,
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Every kind of record a table registered in the master index can hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Note(Note),
    PasswordNote(PasswordNote),
    Blob(Blob),
}

impl Record {
    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Record::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn into_note(self) -> Option<Note> {
        match self {
            Record::Note(note) => Some(note),
            _ => None,
        }
    }

    pub fn into_password_note(self) -> Option<PasswordNote> {
        match self {
            Record::PasswordNote(note) => Some(note),
            _ => None,
        }
    }

    pub fn into_blob(self) -> Option<Blob> {
        match self {
            Record::Blob(blob) => Some(blob),
            _ => None,
        }
    }
}

impl From<Note> for Record {
    fn from(note: Note) -> Self {
        Record::Note(note)
    }
}

impl From<PasswordNote> for Record {
    fn from(note: PasswordNote) -> Self {
        Record::PasswordNote(note)
    }
}

impl From<Blob> for Record {
    fn from(blob: Blob) -> Self {
        Record::Blob(blob)
    }
}

impl TableEntry for Record {
    fn id(&self) -> Option<u64> {
        match self {
            Record::Note(note) => note.id(),
            Record::PasswordNote(note) => note.id(),
            Record::Blob(blob) => blob.id,
        }
    }

    fn set_id(&mut self, id: u64) {
        match self {
            Record::Note(note) => note.set_id(id),
            Record::PasswordNote(note) => note.set_id(id),
            Record::Blob(blob) => blob.id = Some(id),
        }
    }
}

impl IndexedTableEntry for Record {
    fn index_id(&self) -> Option<String> {
        match self {
            Record::Note(note) => note.index_id(),
            Record::PasswordNote(note) => note.index_id(),
            Record::Blob(blob) if !blob.name.is_empty() => Some(blob.name.to_lowercase()),
            Record::Blob(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_index_id_lowercase() {
        let note = Note::new("Bank PIN", "1234");
        assert_eq!(note.index_id(), Some("bank pin".to_string()));
        assert_eq!(Note::new("", "orphan").index_id(), None);
    }

    #[test]
    fn test_tag_string_round_trip() {
        let mut note = Note::new("Trip", "packing list");
        note.tag_with_tag_string(" travel ,summer,, gear ");
        assert_eq!(note.tags().len(), 3);
        assert_eq!(note.tag_string(), "gear, summer, travel");

        note.tag("  extra ");
        assert!(note.tags().contains("extra"));
        assert!(note.untag("summer "));
        assert!(!note.untag("summer"));
        assert_eq!(note.tag_string(), "extra, gear, travel");
    }

    #[test]
    fn test_empty_tag_string() {
        let note = Note::new("Plain", "");
        assert_eq!(note.tag_string(), "");
    }

    #[test]
    fn test_full_text_contains_fields() {
        let mut note = Note::new("Groceries", "milk and eggs");
        note.tag("errands");
        let text = note.full_text();
        assert!(text.starts_with("Groceries errands milk and eggs "));
    }

    #[test]
    fn test_setters_bump_updated_at() {
        let mut note = Note::new("Title", "body");
        let before = note.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(5));
        note.set_message("changed");
        assert!(note.updated_at() > before);
        assert_eq!(note.created_at(), before);
    }

    #[test]
    fn test_password_expiry_renews_on_change() {
        let mut entry = PasswordNote::new("Email", "hunter22");
        let past = Utc::now() - Duration::days(1);
        entry.set_expires_at(past);
        assert!(entry.is_expired());

        // Same value leaves the expiry alone
        entry.set_password("hunter22");
        assert_eq!(entry.expires_at(), past);

        entry.set_password("hunter23");
        assert!(!entry.is_expired());
        assert!(entry.expires_at() > Utc::now() + Duration::days(PASSWORD_LIFETIME_DAYS - 1));
    }

    #[test]
    fn test_password_debug_redacted() {
        let mut entry = PasswordNote::new("Email", "hunter22");
        entry.set_username("alice");
        let debug = format!("{:?}", entry);
        assert!(!debug.contains("hunter22"));
        assert!(debug.contains("alice"));
    }

    #[test]
    fn test_record_conversions() {
        let mut record = Record::from(Note::new("Title", "body"));
        record.set_id(9);
        assert_eq!(record.id(), Some(9));
        assert!(record.as_note().is_some());
        assert!(record.clone().into_password_note().is_none());
        assert_eq!(record.into_note().and_then(|n| n.id), Some(9));

        let blob = Record::from(Blob::new("Config", vec![1, 2]));
        assert_eq!(blob.index_id(), Some("config".to_string()));
        assert_eq!(blob.into_blob().map(|b| b.data), Some(vec![1, 2]));
    }
}
