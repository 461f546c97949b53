use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use digital_safe_core::{DigitalSafe, Note, PasswordNote, SafeConfig};
use serde::Serialize;

use crate::types::{CommandOutput, NoteView, PasswordView};
use crate::utils;

/// Options shared by every subcommand
#[derive(Debug, Clone)]
pub struct SafeOptions {
    pub path: PathBuf,
    pub ttl_secs: u64,
    pub passphrase: Option<String>,
    pub non_interactive: bool,
}

impl SafeOptions {
    pub fn interactive(&self) -> bool {
        !self.non_interactive
    }

    fn config(&self) -> SafeConfig {
        SafeConfig::new(&self.path).with_ttl(Duration::from_secs(self.ttl_secs))
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Open the safe and unlock it with the resolved passphrase
fn unlock(options: &SafeOptions, confirm_new: bool) -> Result<DigitalSafe> {
    let safe = DigitalSafe::with_config(options.config())
        .with_context(|| format!("Failed to open safe '{}'", options.path.display()))?;

    let passphrase =
        utils::resolve_passphrase(options.passphrase.clone(), options.interactive(), confirm_new)?;
    safe.set_passphrase(&passphrase)
        .context("Failed to unlock safe")?;

    tracing::debug!(path = %options.path.display(), "safe unlocked");
    Ok(safe)
}

fn is_new_safe(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Create the safe if needed and verify the passphrase
pub fn init(options: &SafeOptions) -> Result<CommandOutput> {
    let created = is_new_safe(&options.path);
    let safe = unlock(options, created)?;
    let commits = safe.commit_count().context("Failed to read safe state")?;
    safe.lock();

    let message = if created {
        "Safe created"
    } else {
        "Passphrase accepted"
    };

    #[derive(Serialize)]
    struct InitDetails {
        created: bool,
        commit_count: u64,
    }

    Ok(CommandOutput::success(message)
        .with_safe_path(options.display_path())
        .with_details(&InitDetails {
            created,
            commit_count: commits,
        }))
}

/// Store a note, replacing one with the same title
pub fn put_note(
    options: &SafeOptions,
    title: String,
    message: Option<String>,
    tags: Option<String>,
) -> Result<CommandOutput> {
    let message = match message {
        Some(message) => message,
        None if options.interactive() => {
            utils::prompt_line("Note text").context("Failed to read note text")?
        }
        None => String::new(),
    };

    let mut note = Note::new(title, message);
    if let Some(tags) = tags {
        note.tag_with_tag_string(&tags);
    }
    let view = NoteView::from(&note);

    let safe = unlock(options, false)?;
    let id = safe.put_note(note).context("Failed to store note")?;
    safe.lock();
    tracing::info!(id, title = %view.title, "note stored");

    Ok(CommandOutput::success(format!("Note '{}' stored", view.title))
        .with_safe_path(options.display_path())
        .with_details(&view))
}

pub fn get_note(options: &SafeOptions, title: &str) -> Result<CommandOutput> {
    let safe = unlock(options, false)?;
    let note = safe
        .get_note(title)
        .context("Failed to read note")?
        .ok_or_else(|| anyhow!("No note titled '{}'", title))?;
    safe.lock();

    Ok(CommandOutput::success(format!("Note '{}'", note.title()))
        .with_details(&NoteView::from(&note)))
}

/// Notes whose title, text or tags contain `query`
pub fn search_notes(options: &SafeOptions, query: &str) -> Result<CommandOutput> {
    let safe = unlock(options, false)?;
    let notes = safe.search_notes(query).context("Failed to search notes")?;
    safe.lock();

    let views: Vec<NoteView> = notes.iter().map(NoteView::from).collect();
    Ok(
        CommandOutput::success(format!("{} note(s) match '{}'", views.len(), query))
            .with_details(&views),
    )
}

/// Store a password entry, prompting for the password when not supplied
pub fn put_password(
    options: &SafeOptions,
    title: String,
    username: Option<String>,
    url: Option<String>,
    password: Option<String>,
) -> Result<CommandOutput> {
    let password = match password {
        Some(password) => password,
        None if options.interactive() => {
            utils::prompt_password("Password to store").context("Failed to read password")?
        }
        None => bail!("--password is required in non-interactive mode"),
    };

    let mut entry = PasswordNote::new(title, password);
    if let Some(username) = username {
        entry.set_username(username);
    }
    if let Some(url) = url {
        entry.set_url(url);
    }
    let view = PasswordView::new(&entry, false);

    let safe = unlock(options, false)?;
    safe.put_password_note(entry)
        .context("Failed to store password entry")?;
    safe.lock();

    Ok(
        CommandOutput::success(format!("Password entry '{}' stored", view.title))
            .with_safe_path(options.display_path())
            .with_details(&view),
    )
}

pub fn get_password(options: &SafeOptions, title: &str, show: bool) -> Result<CommandOutput> {
    let safe = unlock(options, false)?;
    let entry = safe
        .get_password_note(title)
        .context("Failed to read password entry")?
        .ok_or_else(|| anyhow!("No password entry titled '{}'", title))?;
    safe.lock();

    if entry.is_expired() {
        tracing::warn!(title = %entry.title(), "stored password has expired");
    }

    Ok(
        CommandOutput::success(format!("Password entry '{}'", entry.title()))
            .with_details(&PasswordView::new(&entry, show)),
    )
}

/// Copy a file into the safe
pub fn put_file(options: &SafeOptions, path: &Path, message: Option<String>) -> Result<CommandOutput> {
    if !path.is_file() {
        bail!("File '{}' does not exist", path.display());
    }

    let safe = unlock(options, false)?;
    let listing = safe
        .put_file_with_message(path, message)
        .with_context(|| format!("Failed to store '{}'", path.display()))?;
    safe.lock();

    Ok(CommandOutput::success(format!("File '{}' stored", listing.name))
        .with_safe_path(options.display_path())
        .with_file_size(listing.size))
}

/// Export a stored file to `output`, defaulting to its stored name
pub fn get_file(
    options: &SafeOptions,
    name: &str,
    output: Option<PathBuf>,
    force: bool,
) -> Result<CommandOutput> {
    let output = output.unwrap_or_else(|| PathBuf::from(name));
    utils::check_output_file(&output, force, options.interactive())?;

    let safe = unlock(options, false)?;
    let size = safe
        .export_file(name, &output)
        .with_context(|| format!("Failed to export '{}'", name))?;
    safe.lock();

    Ok(CommandOutput::success(format!("File '{}' exported", name))
        .with_output_path(output.display().to_string())
        .with_file_size(size))
}

pub fn list_files(options: &SafeOptions) -> Result<CommandOutput> {
    let safe = unlock(options, false)?;
    let files = safe.list_files().context("Failed to list files")?;
    safe.lock();

    Ok(CommandOutput::success(format!("{} file(s) stored", files.len()))
        .with_safe_path(options.display_path())
        .with_details(&files))
}

/// Summary of the safe without revealing its contents
pub fn status(options: &SafeOptions) -> Result<CommandOutput> {
    let container_size = fs::metadata(&options.path).map(|m| m.len()).ok();

    #[derive(Serialize)]
    struct StatusDetails {
        exists: bool,
        commit_count: u64,
        stored_files: usize,
        passphrase_ttl_secs: u64,
    }

    let (commit_count, stored_files) = match container_size {
        Some(size) if size > 0 => {
            let safe = unlock(options, false)?;
            let counts = (
                safe.commit_count().context("Failed to read safe state")?,
                safe.list_files().context("Failed to list files")?.len(),
            );
            safe.lock();
            counts
        }
        _ => (0, 0),
    };

    let mut output = CommandOutput::success("Safe status")
        .with_safe_path(options.display_path())
        .with_details(&StatusDetails {
            exists: container_size.is_some(),
            commit_count,
            stored_files,
            passphrase_ttl_secs: options.ttl_secs,
        });
    if let Some(size) = container_size {
        output = output.with_file_size(size);
    }
    Ok(output)
}

/// Erase every record after verifying the passphrase
pub fn reset(options: &SafeOptions, force: bool) -> Result<CommandOutput> {
    let safe = unlock(options, false)?;

    if !force {
        if !options.interactive() {
            bail!("Refusing to erase the safe without --force in non-interactive mode");
        }
        let prompt = format!("Erase every record in '{}'?", options.path.display());
        if !utils::confirm(&prompt).context("Failed to get confirmation")? {
            bail!("Operation cancelled by user");
        }
    }

    safe.clear().context("Failed to clear safe")?;
    safe.lock();
    tracing::warn!(path = %options.path.display(), "safe erased");

    Ok(CommandOutput::success("Safe erased").with_safe_path(options.display_path()))
}
