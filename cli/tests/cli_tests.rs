use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PASSPHRASE: &str = "CorrectHorse1";

fn safe_cmd(safe: &Path, passphrase: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("digitalsafe").unwrap();
    cmd.env("DIGITALSAFE_PATH", safe)
        .env("DIGITALSAFE_PASSPHRASE", passphrase)
        .env_remove("RUST_LOG")
        .arg("--non-interactive");
    cmd
}

#[test]
fn init_creates_container() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("digitalSafe.safe");

    safe_cmd(&safe, PASSPHRASE)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Safe created"));

    assert!(fs::metadata(&safe).unwrap().len() > 0);

    safe_cmd(&safe, PASSPHRASE)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Passphrase accepted"));
}

#[test]
fn short_passphrase_rejected() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("short.safe");

    safe_cmd(&safe, "short")
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid passphrase"));
}

#[test]
fn wrong_passphrase_fails() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("wrong.safe");
    safe_cmd(&safe, PASSPHRASE).arg("init").assert().success();

    safe_cmd(&safe, "WrongHorse1")
        .args(["note", "search", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid passphrase"));
}

#[test]
fn note_put_get_json() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("notes.safe");

    safe_cmd(&safe, PASSPHRASE)
        .args(["note", "put", "Shopping", "--message", "eggs and bread", "--tags", "home,food"])
        .assert()
        .success();

    let output = safe_cmd(&safe, PASSPHRASE)
        .args(["--json", "note", "get", "shopping"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["details"]["title"], "Shopping");
    assert_eq!(json["details"]["message"], "eggs and bread");
    assert_eq!(json["details"]["tags"], serde_json::json!(["food", "home"]));
}

#[test]
fn missing_note_reports_failure() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("missing.safe");

    safe_cmd(&safe, PASSPHRASE)
        .args(["note", "get", "nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No note titled 'nothing'"));
}

#[test]
fn password_hidden_unless_shown() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("passwords.safe");

    safe_cmd(&safe, PASSPHRASE)
        .args(["password", "put", "Bank", "--username", "alice", "--password", "s3cr3t-pw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cr3t-pw").not());

    safe_cmd(&safe, PASSPHRASE)
        .args(["password", "get", "bank"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice").and(predicate::str::contains("s3cr3t-pw").not()));

    safe_cmd(&safe, PASSPHRASE)
        .args(["password", "get", "bank", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cr3t-pw"));
}

#[test]
fn file_put_list_export() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("files.safe");
    let source = dir.path().join("report.txt");
    fs::write(&source, b"quarterly numbers").unwrap();

    safe_cmd(&safe, PASSPHRASE)
        .args(["file", "put"])
        .arg(&source)
        .assert()
        .success();

    safe_cmd(&safe, PASSPHRASE)
        .args(["file", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("report.txt"));

    let exported = dir.path().join("out.txt");
    safe_cmd(&safe, PASSPHRASE)
        .args(["file", "get", "report.txt", "--output"])
        .arg(&exported)
        .assert()
        .success();
    assert_eq!(fs::read(&exported).unwrap(), b"quarterly numbers");

    // Existing output is kept without --force
    safe_cmd(&safe, PASSPHRASE)
        .args(["file", "get", "report.txt", "--output"])
        .arg(&exported)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn reset_erases_records() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("reset.safe");

    safe_cmd(&safe, PASSPHRASE)
        .args(["note", "put", "temp", "--message", "gone soon"])
        .assert()
        .success();

    safe_cmd(&safe, PASSPHRASE)
        .args(["reset", "--force"])
        .assert()
        .success();

    // An erased safe accepts a new passphrase
    safe_cmd(&safe, "AnotherHorse2")
        .args(["note", "get", "temp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No note titled"));
}

#[test]
fn ttl_out_of_range_rejected() {
    let dir = tempdir().unwrap();
    let safe = dir.path().join("ttl.safe");

    for ttl in ["0", "18446744073709551615"] {
        safe_cmd(&safe, PASSPHRASE)
            .args(["--ttl", ttl, "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--ttl"));
    }
    assert!(!safe.exists());

    safe_cmd(&safe, PASSPHRASE)
        .args(["--ttl", "1", "init"])
        .assert()
        .success();
}
