use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, warn};
use rand::{distributions::Alphanumeric, Rng};
use walkdir::WalkDir;

use crate::error::AppError;

const RECEIPT_DIR: &str = "Receipts";
const RECEIPT_PREFIX: &str = "RECEIPT_";

pub fn ensure_receipt_base(app_dir: &Path) -> Result<PathBuf, AppError> {
  let receipt_dir = app_dir.join(RECEIPT_DIR);
  fs::create_dir_all(&receipt_dir)?;
  Ok(receipt_dir)
}

/// Copies a captured photo into the receipt folder under a unique,
/// timestamped name and returns the stored path.
pub fn import_receipt(source_path: &str, receipt_base: &Path) -> Result<String, AppError> {
  let source = Path::new(source_path);
  if !source.is_file() {
    return Err(AppError::new("RECEIPT_NOT_FOUND", format!("Receipt file not found: {source_path}")));
  }

  fs::create_dir_all(receipt_base)?;
  let ext = source.extension().and_then(|v| v.to_str()).unwrap_or("jpg");
  let stamp = Local::now().format("%Y%m%d_%H%M%S");
  let mut candidate = receipt_base.join(format!("{RECEIPT_PREFIX}{stamp}_{}.{ext}", random_suffix()));
  while candidate.exists() {
    candidate = receipt_base.join(format!("{RECEIPT_PREFIX}{stamp}_{}.{ext}", random_suffix()));
  }

  fs::copy(source, &candidate)?;
  debug!("stored receipt {}", candidate.display());
  Ok(candidate.to_string_lossy().to_string())
}

/// Deletes receipt files under `receipt_base` that no cached transaction points at.
pub fn prune_orphans(receipt_base: &Path, referenced: &[String]) -> Result<usize, AppError> {
  if !receipt_base.exists() {
    return Ok(0);
  }

  let keep: HashSet<PathBuf> = referenced.iter().map(PathBuf::from).collect();
  let mut removed = 0;
  for entry in WalkDir::new(receipt_base).into_iter().filter_map(Result::ok) {
    if !entry.file_type().is_file() {
      continue;
    }
    let name = entry.file_name().to_string_lossy();
    if !name.starts_with(RECEIPT_PREFIX) || keep.contains(entry.path()) {
      continue;
    }
    match fs::remove_file(entry.path()) {
      Ok(()) => removed += 1,
      Err(err) => warn!("could not remove {}: {err}", entry.path().display()),
    }
  }
  Ok(removed)
}

fn random_suffix() -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(8)
    .map(char::from)
    .collect()
}
