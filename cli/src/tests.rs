use crate::commands::SafeOptions;
use crate::types::{CommandOutput, NoteView, PasswordView};
use crate::utils;
use chrono::{TimeZone, Utc};
use digital_safe_core::{Note, PasswordNote};
use tempfile::TempDir;

fn options_for(dir: &TempDir, passphrase: Option<&str>) -> SafeOptions {
    SafeOptions {
        path: dir.path().join("test.safe"),
        ttl_secs: 60,
        passphrase: passphrase.map(str::to_string),
        non_interactive: true,
    }
}

#[test]
fn test_command_output_builder() {
    let output = CommandOutput::success("done")
        .with_safe_path("a.safe")
        .with_file_size(42);

    assert!(output.success);
    assert_eq!(output.safe_path.as_deref(), Some("a.safe"));
    assert_eq!(output.file_size, Some(42));
    assert!(output.error.is_none());
}

#[test]
fn test_command_output_json_skips_empty_fields() {
    let output = CommandOutput::failure("broken", None);
    let json = serde_json::to_value(&output).expect("Serialization failed");

    assert_eq!(json["success"], false);
    assert!(json.get("safe_path").is_none());
    assert!(json.get("error").is_none());
}

#[test]
fn test_note_view_lists_tags_in_order() {
    let mut note = Note::new("groceries", "milk");
    note.tag_with_tag_string("home, errands");

    let view = NoteView::from(&note);
    assert_eq!(view.title, "groceries");
    assert_eq!(view.tags, vec!["errands".to_string(), "home".to_string()]);
}

#[test]
fn test_password_view_hides_password_by_default() {
    let entry = PasswordNote::new("Mail", "hunter22");

    let hidden = serde_json::to_value(PasswordView::new(&entry, false)).expect("Serialization failed");
    assert!(hidden.get("password").is_none());

    let shown = PasswordView::new(&entry, true);
    assert_eq!(shown.password.as_deref(), Some("hunter22"));
}

#[test]
fn test_format_timestamp() {
    let timestamp = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
    assert_eq!(utils::format_timestamp(timestamp), "2024-03-09 14:05:00 UTC");
}

#[test]
fn test_format_bytes() {
    let formatted = utils::format_bytes(1536);
    assert!(formatted.contains("KiB"));
    assert!(formatted.ends_with("(1536 bytes)"));
}

#[test]
fn test_resolve_passphrase_requires_value_when_non_interactive() {
    assert!(utils::resolve_passphrase(None, false, false).is_err());
    assert_eq!(
        utils::resolve_passphrase(Some("CorrectHorse1".into()), false, false).expect("Resolve failed"),
        "CorrectHorse1"
    );
}

#[test]
fn test_check_output_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("exists.txt");
    std::fs::write(&path, b"x").expect("Write failed");

    assert!(utils::check_output_file(&dir.path().join("missing.txt"), false, false).is_ok());
    assert!(utils::check_output_file(&path, false, false).is_err());
    assert!(utils::check_output_file(&path, true, false).is_ok());
}

#[test]
fn test_note_commands_round_trip() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let options = options_for(&dir, Some("CorrectHorse1"));

    crate::commands::init(&options).expect("Init failed");
    crate::commands::put_note(
        &options,
        "Plans".into(),
        Some("climb the hill".into()),
        Some("outdoor".into()),
    )
    .expect("Put failed");

    let output = crate::commands::get_note(&options, "plans").expect("Get failed");
    let details = output.details.expect("Details missing");
    assert_eq!(details["message"], "climb the hill");

    let found = crate::commands::search_notes(&options, "HILL").expect("Search failed");
    assert_eq!(found.details.expect("Details missing").as_array().map(Vec::len), Some(1));
}

#[test]
fn test_wrong_passphrase_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    crate::commands::init(&options_for(&dir, Some("CorrectHorse1"))).expect("Init failed");

    let result = crate::commands::list_files(&options_for(&dir, Some("WrongHorse1")));
    assert!(result.is_err());
}

#[test]
fn test_reset_requires_force_when_non_interactive() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let options = options_for(&dir, Some("CorrectHorse1"));
    crate::commands::init(&options).expect("Init failed");

    assert!(crate::commands::reset(&options, false).is_err());
    assert!(crate::commands::reset(&options, true).is_ok());
}
