pub mod api;
pub mod audit;
pub mod cli;
pub mod commands;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod files;
pub mod models;
pub mod reports;
pub mod settings;
pub mod store;
pub mod sync;

use std::path::{Path, PathBuf};
use std::time::Duration;

use api::{ApiClient, RemoteApi};
use db::Db;
use error::AppError;

pub struct AppState {
  pub db: Db,
  pub app_dir: PathBuf,
  pub receipt_base: PathBuf,
  pub api: Box<dyn RemoteApi>,
}

impl AppState {
  /// Opens the local cache in `app_dir` and points the API client at the
  /// configured base URL.
  pub fn open(app_dir: &Path) -> Result<Self, AppError> {
    let (db, receipt_base) = db::init_db(app_dir)?;
    let settings = db::with_conn(&db, |conn| settings::get_settings(conn))?;
    let api = ApiClient::new(&settings.api_base_url, Duration::from_secs(settings.request_timeout_secs));
    Ok(Self {
      db,
      app_dir: app_dir.to_path_buf(),
      receipt_base,
      api: Box::new(api),
    })
  }

  pub fn with_remote(db: Db, app_dir: PathBuf, receipt_base: PathBuf, api: Box<dyn RemoteApi>) -> Self {
    Self {
      db,
      app_dir,
      receipt_base,
      api,
    }
  }
}

#[cfg(test)]
pub(crate) mod test_support;
