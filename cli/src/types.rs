use digital_safe_core::{Note, PasswordNote};
use serde::Serialize;

/// Structured output for JSON mode
#[derive(Serialize, Debug, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutput {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error,
            ..Self::default()
        }
    }

    pub fn with_safe_path(mut self, path: impl Into<String>) -> Self {
        self.safe_path = Some(path.into());
        self
    }

    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    /// Attach any serializable payload; dropped silently if it cannot be encoded
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }
}

/// Printable view of a note
#[derive(Serialize, Debug)]
pub struct NoteView {
    pub title: String,
    pub message: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Note> for NoteView {
    fn from(note: &Note) -> Self {
        Self {
            title: note.title().to_string(),
            message: note.message().to_string(),
            tags: note.tags().iter().cloned().collect(),
            created_at: crate::utils::format_timestamp(note.created_at()),
            updated_at: crate::utils::format_timestamp(note.updated_at()),
        }
    }
}

/// Printable view of a password entry; the password is only included on request
#[derive(Serialize, Debug)]
pub struct PasswordView {
    pub title: String,
    pub username: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub expires_at: String,
    pub expired: bool,
}

impl PasswordView {
    pub fn new(entry: &PasswordNote, reveal: bool) -> Self {
        Self {
            title: entry.title().to_string(),
            username: entry.username().to_string(),
            url: entry.url().to_string(),
            password: reveal.then(|| entry.password().to_string()),
            expires_at: crate::utils::format_timestamp(entry.expires_at()),
            expired: entry.is_expired(),
        }
    }
}
