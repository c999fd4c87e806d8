//! Batch conversion of raw per-route log files into structured JSONL
//!
//! The forwarder writes one raw `.log` file per worker under a per-route
//! folder. `convert` flattens a folder's `*.log` lines into a single
//! JSONL file, either for an explicit folder or for every openai-kind
//! route's default location (`./Log/<route>/chat` → `./Log/chat_<route>.json`).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{Config, RuleKind};
use crate::error::ControlError;

/// Render a route prefix as a filesystem-safe name: "/" becomes "root",
/// inner slashes become underscores.
pub fn route_to_str(route: &str) -> String {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.replace('/', "_")
    }
}

/// Convert every `*.log` file in `log_folder` into one JSONL file at
/// `target_path`. Lines that already are JSON objects pass through
/// verbatim; anything else is wrapped as `{"message": <line>}` so no
/// input line is silently dropped.
pub fn convert_folder(log_folder: &Path, target_path: &Path) -> Result<usize, ControlError> {
    let mut log_files: Vec<PathBuf> = fs::read_dir(log_folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
        .collect();
    log_files.sort();

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut target = fs::File::create(target_path)?;

    let mut records = 0usize;
    for file in &log_files {
        for line in fs::read_to_string(file)?.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(value) if value.is_object() => writeln!(target, "{value}")?,
                _ => writeln!(target, "{}", serde_json::json!({ "message": line }))?,
            }
            records += 1;
        }
    }

    tracing::debug!(
        folder = %log_folder.display(),
        target = %target_path.display(),
        files = log_files.len(),
        records,
        "converted log folder"
    );
    Ok(records)
}

/// Entry point for the `convert` subcommand.
///
/// A target path without a source folder is a usage error, raised before
/// any filesystem access; the configuration is loaded only in the
/// no-folder branch, which is the only one that consults it. With no
/// folder, every openai-kind forward route's default log location is
/// converted.
pub fn run_convert(
    log_folder: Option<&Path>,
    target_path: Option<&Path>,
) -> Result<(), ControlError> {
    match (log_folder, target_path) {
        (None, Some(_)) => Err(ControlError::Usage(
            "--target-path requires --log-folder".to_string(),
        )),
        (Some(folder), target) => {
            let default_target = folder.join("converted.jsonl");
            let target = target.unwrap_or(&default_target);
            println!("Convert {}/*.log to {}", folder.display(), target.display());
            let records = convert_folder(folder, target)?;
            println!("  {records} records");
            Ok(())
        }
        (None, None) => {
            let config = Config::load()?;
            for rule in config
                .forward
                .iter()
                .filter(|r| r.kind == RuleKind::Openai)
            {
                let name = route_to_str(&rule.route);
                let folder = PathBuf::from(format!("./Log/{name}/chat"));
                let target = PathBuf::from(format!("./Log/chat_{name}.json"));
                println!("Convert {}/*.log to {}", folder.display(), target.display());
                match convert_folder(&folder, &target) {
                    Ok(records) => println!("  {records} records"),
                    Err(ControlError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                        println!("  skipped: {} does not exist", folder.display());
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
    }
}
