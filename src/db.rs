use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::files::receipts;
use crate::settings;

const DB_FILE: &str = "ecowallet.sqlite";

pub struct Db {
  pub conn: Mutex<Connection>,
  pub db_path: PathBuf,
}

/// Resolves the data directory: `ECOWALLET_HOME` when set, otherwise the
/// platform's local data dir.
pub fn resolve_app_dir() -> Result<PathBuf, AppError> {
  if let Ok(home) = std::env::var("ECOWALLET_HOME") {
    if !home.trim().is_empty() {
      return Ok(PathBuf::from(home));
    }
  }

  let base = dirs_next::data_local_dir()
    .ok_or_else(|| AppError::new("PATH", "Local data directory not found"))?;
  Ok(base.join("EcoWallet"))
}

pub fn init_db(app_dir: &Path) -> Result<(Db, PathBuf), AppError> {
  fs::create_dir_all(app_dir)?;
  let db_path = app_dir.join(DB_FILE);
  let mut conn = Connection::open(&db_path)?;
  conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
  conn.busy_timeout(Duration::from_secs(5))?;

  run_migrations(&mut conn)?;

  let receipt_base = receipts::ensure_receipt_base(app_dir)?;
  settings::ensure_defaults(&conn, &receipt_base)?;
  info!("opened local cache at {}", db_path.display());

  Ok((
    Db {
      conn: Mutex::new(conn),
      db_path,
    },
    receipt_base,
  ))
}

/// Fresh in-memory cache with the schema applied. Settings are not seeded.
pub fn open_in_memory() -> Result<Db, AppError> {
  let mut conn = Connection::open_in_memory()?;
  conn.execute_batch("PRAGMA foreign_keys = ON;")?;
  run_migrations(&mut conn)?;
  Ok(Db {
    conn: Mutex::new(conn),
    db_path: PathBuf::from(":memory:"),
  })
}

pub fn with_conn<T>(db: &Db, f: impl FnOnce(&mut Connection) -> Result<T, AppError>) -> Result<T, AppError> {
  let mut guard = db.conn.lock()?;
  f(&mut guard)
}

fn run_migrations(conn: &mut Connection) -> Result<(), AppError> {
  conn.execute_batch(
    "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
  )?;

  apply_migration(conn, "001_init", include_str!("../migrations/001_init.sql"))?;
  Ok(())
}

fn apply_migration(conn: &mut Connection, version: &str, sql: &str) -> Result<(), AppError> {
  let exists: i64 = conn.query_row(
    "SELECT COUNT(*) FROM schema_migrations WHERE version = ?1",
    params![version],
    |row| row.get(0),
  )?;
  if exists > 0 {
    return Ok(());
  }

  let tx = conn.transaction()?;
  tx.execute_batch(sql)?;
  tx.execute(
    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
    params![version, Utc::now().to_rfc3339()],
  )?;
  tx.commit()?;
  debug!("applied migration {version}");
  Ok(())
}
