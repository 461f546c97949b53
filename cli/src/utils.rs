use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use humansize::{format_size, BINARY};

use crate::types::CommandOutput;

/// Prompt for a secret without echo
pub fn prompt_password(prompt: &str) -> io::Result<String> {
    eprint!("{}: ", prompt);
    io::stderr().flush()?;

    let password = rpassword::read_password()?;
    if password.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Passphrase cannot be empty",
        ));
    }
    Ok(password)
}

/// Read one line of plain input
pub fn prompt_line(prompt: &str) -> io::Result<String> {
    eprint!("{}: ", prompt);
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

/// Ask a yes/no question, defaulting to no
pub fn confirm(prompt: &str) -> io::Result<bool> {
    let answer = prompt_line(&format!("{} (y/n)", prompt))?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Use the supplied passphrase or prompt for one.
///
/// With `confirm_new` the prompt asks twice and both entries must match.
pub fn resolve_passphrase(
    supplied: Option<String>,
    interactive: bool,
    confirm_new: bool,
) -> Result<String> {
    if let Some(passphrase) = supplied {
        return Ok(passphrase);
    }
    if !interactive {
        bail!("Passphrase is required in non-interactive mode (set DIGITALSAFE_PASSPHRASE)");
    }

    let passphrase =
        prompt_password("Enter safe passphrase").context("Failed to read passphrase")?;
    if confirm_new {
        let again =
            prompt_password("Confirm passphrase").context("Failed to read confirmation")?;
        if passphrase != again {
            bail!("Passphrases do not match");
        }
    }
    Ok(passphrase)
}

/// Refuse to clobber `path` unless forced or confirmed
pub fn check_output_file(path: &Path, force: bool, interactive: bool) -> Result<()> {
    if !path.exists() || force {
        return Ok(());
    }
    if interactive {
        let prompt = format!("File '{}' already exists. Overwrite?", path.display());
        if confirm(&prompt).context("Failed to get confirmation")? {
            return Ok(());
        }
        bail!("Operation cancelled by user");
    }
    bail!(
        "Output file '{}' already exists. Use --force to overwrite.",
        path.display()
    )
}

/// Output result in JSON or text format
pub fn output_result(result: CommandOutput, json_format: bool) {
    if json_format {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(_) => eprintln!("Error serializing JSON output"),
        }
        return;
    }

    if !result.success {
        eprintln!("✗ Error: {}", result.message);
        if let Some(details) = result.error {
            eprintln!("  Details: {}", details);
        }
        return;
    }

    println!("✓ {}", result.message);
    if let Some(path) = result.safe_path {
        println!("  Safe: {}", path);
    }
    if let Some(output) = result.output_path {
        println!("  Output: {}", output);
    }
    if let Some(size) = result.file_size {
        println!("  Size: {}", format_bytes(size));
    }
    if let Some(details) = result.details {
        print_details(&details, 1);
    }
}

fn print_details(value: &serde_json::Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                match value {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{}{}:", indent, key);
                        print_details(value, depth + 1);
                    }
                    other => println!("{}{}: {}", indent, key, plain(other)),
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Object(_) => {
                        print_details(item, depth);
                        println!();
                    }
                    other => println!("{}- {}", indent, plain(other)),
                }
            }
        }
        other => println!("{}{}", indent, plain(other)),
    }
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Human readable byte count, e.g. `1.5 KiB (1536 bytes)`
pub fn format_bytes(size: u64) -> String {
    format!("{} ({} bytes)", format_size(size, BINARY), size)
}

/// Format a timestamp using chrono
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
