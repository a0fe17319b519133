use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rand::{distributions::Alphanumeric, Rng};

use crate::api::{ApiError, RemoteApi};
use crate::db;
use crate::models::{LoginRequest, RegisterRequest, Transaction, User};
use crate::AppState;

pub fn temp_dir(prefix: &str) -> PathBuf {
  let suffix: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(10)
    .map(char::from)
    .collect();
  let dir = std::env::temp_dir().join(format!("ecowallet-{prefix}-{suffix}"));
  std::fs::create_dir_all(&dir).unwrap();
  dir
}

#[derive(Default)]
pub struct RemoteState {
  pub user: Option<User>,
  pub password: String,
  pub transactions: Vec<Transaction>,
  pub balance_pushes: Vec<f64>,
  pub deleted: Vec<String>,
  pub offline: bool,
  pub reject_writes: bool,
}

/// In-memory stand-in for the remote API. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct FakeRemote {
  pub state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
  pub fn with_user(user: User, password: &str) -> Self {
    let remote = FakeRemote::default();
    {
      let mut state = remote.state.lock().unwrap();
      state.user = Some(user);
      state.password = password.to_string();
    }
    remote
  }

  pub fn set_offline(&self, offline: bool) {
    self.state.lock().unwrap().offline = offline;
  }

  pub fn set_reject_writes(&self, reject: bool) {
    self.state.lock().unwrap().reject_writes = reject;
  }

  fn guard(&self) -> Result<std::sync::MutexGuard<'_, RemoteState>, ApiError> {
    let state = self.state.lock().unwrap();
    if state.offline {
      return Err(ApiError::Transport("connection refused".to_string()));
    }
    Ok(state)
  }

  fn writable(&self) -> Result<std::sync::MutexGuard<'_, RemoteState>, ApiError> {
    let state = self.guard()?;
    if state.reject_writes {
      return Err(ApiError::Status {
        status: 500,
        message: "write failed".to_string(),
      });
    }
    Ok(state)
  }
}

impl RemoteApi for FakeRemote {
  fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
    let state = self.guard()?;
    match &state.user {
      Some(user) if user.username == request.username && state.password == request.password => Ok(user.clone()),
      _ => Err(ApiError::Rejected("Invalid credentials".to_string())),
    }
  }

  fn register(&self, request: &RegisterRequest) -> Result<String, ApiError> {
    let mut state = self.guard()?;
    if state.user.as_ref().map(|u| u.username == request.username).unwrap_or(false) {
      return Err(ApiError::Rejected("User already exists".to_string()));
    }
    state.user = Some(User {
      id: format!("id-{}", request.username),
      username: request.username.clone(),
      email: request.email.clone(),
      balance: 0.0,
    });
    state.password = request.password.clone();
    Ok("User created".to_string())
  }

  fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>, ApiError> {
    let state = self.guard()?;
    Ok(state.transactions.iter().filter(|t| t.user_id == user_id).cloned().collect())
  }

  fn create_transaction(&self, item: &Transaction) -> Result<(), ApiError> {
    let mut state = self.writable()?;
    state.transactions.push(item.clone());
    Ok(())
  }

  fn update_transaction(&self, id: &str, item: &Transaction) -> Result<(), ApiError> {
    let mut state = self.writable()?;
    match state.transactions.iter_mut().find(|t| t.id == id) {
      Some(existing) => {
        *existing = item.clone();
        Ok(())
      }
      None => Err(ApiError::Status {
        status: 404,
        message: "not found".to_string(),
      }),
    }
  }

  fn delete_transaction(&self, id: &str) -> Result<(), ApiError> {
    let mut state = self.writable()?;
    state.transactions.retain(|t| t.id != id);
    state.deleted.push(id.to_string());
    Ok(())
  }

  fn update_balance(&self, _user_id: &str, balance: f64) -> Result<(), ApiError> {
    let mut state = self.writable()?;
    state.balance_pushes.push(balance);
    if let Some(user) = state.user.as_mut() {
      user.balance = balance;
    }
    Ok(())
  }
}

pub fn sample_user(balance: f64) -> User {
  User {
    id: "u1".to_string(),
    username: "ana".to_string(),
    email: "ana@example.com".to_string(),
    balance,
  }
}

/// App state over an in-memory cache and the given fake remote.
pub fn state_with(remote: &FakeRemote) -> AppState {
  let dir = temp_dir("state");
  let receipt_base = dir.join("Receipts");
  std::fs::create_dir_all(&receipt_base).unwrap();
  let db = db::open_in_memory().unwrap();
  db::with_conn(&db, |conn| crate::settings::ensure_defaults(conn, &receipt_base)).unwrap();
  AppState::with_remote(db, dir, receipt_base, Box::new(remote.clone()))
}
