use serde::Serialize;

use crate::api::ApiError;

#[derive(Debug, Serialize)]
pub struct AppError {
  pub code: String,
  pub message: String,
}

impl AppError {
  pub fn new(code: &str, message: impl Into<String>) -> Self {
    Self {
      code: code.to_string(),
      message: message.into(),
    }
  }

  pub fn is(&self, code: &str) -> bool {
    self.code == code
  }
}

impl std::fmt::Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for AppError {}

impl From<rusqlite::Error> for AppError {
  fn from(err: rusqlite::Error) -> Self {
    AppError::new("DB_ERROR", err.to_string())
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::new("IO_ERROR", err.to_string())
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::new("JSON_ERROR", err.to_string())
  }
}

impl From<ApiError> for AppError {
  fn from(err: ApiError) -> Self {
    match err {
      ApiError::Transport(message) => AppError::new("NETWORK", message),
      ApiError::Rejected(message) => AppError::new("REMOTE_REJECTED", message),
      ApiError::Status { status, message } => {
        AppError::new("REMOTE_REJECTED", format!("HTTP {status}: {message}"))
      }
      ApiError::Decode(message) => AppError::new("REMOTE_DECODE", message),
    }
  }
}

impl<T> From<std::sync::PoisonError<T>> for AppError {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    AppError::new("LOCK_ERROR", "Database lock failed")
  }
}
