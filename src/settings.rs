use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::Settings;

pub const DEFAULT_API_BASE_URL: &str = "https://ecowallet-api.onrender.com/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

const KEY_API_BASE_URL: &str = "api_base_url";
const KEY_RECEIPT_BASE: &str = "receipt_base_folder";
const KEY_TIMEOUT: &str = "request_timeout_secs";

pub fn ensure_defaults(conn: &Connection, receipt_base: &Path) -> Result<(), AppError> {
  conn.execute(
    "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_API_BASE_URL, DEFAULT_API_BASE_URL],
  )?;
  conn.execute(
    "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_RECEIPT_BASE, receipt_base.to_string_lossy().to_string()],
  )?;
  conn.execute(
    "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_TIMEOUT, DEFAULT_TIMEOUT_SECS.to_string()],
  )?;
  Ok(())
}

/// Reads the stored settings. `ECOWALLET_API_URL` overrides the stored base URL.
pub fn get_settings(conn: &Connection) -> Result<Settings, AppError> {
  let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
  let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

  let mut api_base_url = DEFAULT_API_BASE_URL.to_string();
  let mut receipt_base_folder = String::new();
  let mut request_timeout_secs = DEFAULT_TIMEOUT_SECS;

  for row in rows {
    let (key, value) = row?;
    match key.as_str() {
      KEY_API_BASE_URL => {
        api_base_url = value;
      }
      KEY_RECEIPT_BASE => {
        receipt_base_folder = value;
      }
      KEY_TIMEOUT => {
        request_timeout_secs = value.parse().unwrap_or(request_timeout_secs);
      }
      _ => {}
    }
  }

  if let Ok(url) = std::env::var("ECOWALLET_API_URL") {
    if !url.trim().is_empty() {
      api_base_url = url;
    }
  }

  Ok(Settings {
    api_base_url: normalize_base_url(&api_base_url),
    receipt_base_folder,
    request_timeout_secs,
  })
}

pub fn update_settings(conn: &Connection, settings: &Settings) -> Result<(), AppError> {
  conn.execute(
    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_API_BASE_URL, normalize_base_url(&settings.api_base_url)],
  )?;
  conn.execute(
    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_RECEIPT_BASE, settings.receipt_base_folder.clone()],
  )?;
  conn.execute(
    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
    params![KEY_TIMEOUT, settings.request_timeout_secs.to_string()],
  )?;
  Ok(())
}

/// Relative endpoint paths are joined onto the base, so it must end with `/`.
pub fn normalize_base_url(url: &str) -> String {
  let trimmed = url.trim();
  if trimmed.ends_with('/') {
    trimmed.to_string()
  } else {
    format!("{trimmed}/")
  }
}
