//! Client for the remote EcoWallet REST API, the system of record for
//! accounts, balances and transactions.

use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{BalanceRequest, LoginRequest, LoginResponse, RegisterRequest, Transaction, User};

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("network failure: {0}")]
  Transport(String),
  #[error("server returned {status}: {message}")]
  Status { status: u16, message: String },
  #[error("{0}")]
  Rejected(String),
  #[error("unexpected response body: {0}")]
  Decode(String),
}

/// The operations the app needs from the remote side.
pub trait RemoteApi: Send + Sync {
  fn login(&self, request: &LoginRequest) -> Result<User, ApiError>;
  /// Returns the server's confirmation message.
  fn register(&self, request: &RegisterRequest) -> Result<String, ApiError>;
  fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>, ApiError>;
  fn create_transaction(&self, item: &Transaction) -> Result<(), ApiError>;
  fn update_transaction(&self, id: &str, item: &Transaction) -> Result<(), ApiError>;
  fn delete_transaction(&self, id: &str) -> Result<(), ApiError>;
  fn update_balance(&self, user_id: &str, balance: f64) -> Result<(), ApiError>;
}

pub struct ApiClient {
  agent: ureq::Agent,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: &str, timeout: Duration) -> Self {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    Self {
      agent,
      base_url: crate::settings::normalize_base_url(base_url),
    }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path.trim_start_matches('/'))
  }

  fn auth_call(&self, path: &str, body: impl serde::Serialize) -> Result<LoginResponse, ApiError> {
    let url = self.url(path);
    debug!("POST {url}");
    match self.agent.post(&url).send_json(body) {
      Ok(response) => read_json::<LoginResponse>(response),
      Err(ureq::Error::Status(status, response)) => {
        // Auth endpoints explain rejections in a LoginResponse body.
        let body = response.into_string().unwrap_or_default();
        match serde_json::from_str::<LoginResponse>(&body) {
          Ok(parsed) if !parsed.message.trim().is_empty() => Err(ApiError::Rejected(parsed.message)),
          _ => Err(ApiError::Status {
            status,
            message: extract_message(&body),
          }),
        }
      }
      Err(err) => Err(transport(err)),
    }
  }
}

impl RemoteApi for ApiClient {
  fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
    let response = self.auth_call("auth/login", request)?;
    if response.error {
      return Err(ApiError::Rejected(rejection_message(&response)));
    }
    response
      .user
      .ok_or_else(|| ApiError::Decode("login succeeded without a user".to_string()))
  }

  fn register(&self, request: &RegisterRequest) -> Result<String, ApiError> {
    let response = self.auth_call("auth/register", request)?;
    if response.error {
      return Err(ApiError::Rejected(rejection_message(&response)));
    }
    Ok(response.message)
  }

  fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>, ApiError> {
    let url = self.url("despesas");
    debug!("GET {url}?userId={user_id}");
    let response = self
      .agent
      .get(&url)
      .query("userId", user_id)
      .call()
      .map_err(status_or_transport)?;
    read_json(response)
  }

  fn create_transaction(&self, item: &Transaction) -> Result<(), ApiError> {
    let url = self.url("despesas");
    debug!("POST {url} ({})", item.id);
    self.agent.post(&url).send_json(item).map_err(status_or_transport)?;
    Ok(())
  }

  fn update_transaction(&self, id: &str, item: &Transaction) -> Result<(), ApiError> {
    let url = self.url(&format!("despesas/{id}"));
    debug!("PUT {url}");
    self.agent.put(&url).send_json(item).map_err(status_or_transport)?;
    Ok(())
  }

  fn delete_transaction(&self, id: &str) -> Result<(), ApiError> {
    let url = self.url(&format!("despesas/{id}"));
    debug!("DELETE {url}");
    self.agent.delete(&url).call().map_err(status_or_transport)?;
    Ok(())
  }

  fn update_balance(&self, user_id: &str, balance: f64) -> Result<(), ApiError> {
    let url = self.url(&format!("users/{user_id}/saldo"));
    debug!("PUT {url} saldo={balance:.2}");
    self
      .agent
      .put(&url)
      .send_json(BalanceRequest { saldo: balance })
      .map_err(status_or_transport)?;
    Ok(())
  }
}

fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, ApiError> {
  let body = response
    .into_string()
    .map_err(|err| ApiError::Transport(err.to_string()))?;
  serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
}

fn status_or_transport(err: ureq::Error) -> ApiError {
  match err {
    ureq::Error::Status(status, response) => {
      let body = response.into_string().unwrap_or_default();
      ApiError::Status {
        status,
        message: extract_message(&body),
      }
    }
    other => transport(other),
  }
}

fn transport(err: ureq::Error) -> ApiError {
  ApiError::Transport(err.to_string())
}

fn rejection_message(response: &LoginResponse) -> String {
  if response.message.trim().is_empty() {
    "Unknown error".to_string()
  } else {
    response.message.clone()
  }
}

/// Pulls `message` out of a JSON error body, falling back to the raw text.
fn extract_message(body: &str) -> String {
  serde_json::from_str::<serde_json::Value>(body)
    .ok()
    .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(str::to_string))
    .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn urls_join_onto_normalized_base() {
    let client = ApiClient::new("http://127.0.0.1:9/api", Duration::from_secs(1));
    assert_eq!(client.base_url(), "http://127.0.0.1:9/api/");
    assert_eq!(client.url("despesas/42"), "http://127.0.0.1:9/api/despesas/42");
    assert_eq!(client.url("/auth/login"), "http://127.0.0.1:9/api/auth/login");
  }

  #[test]
  fn error_messages_prefer_json_field() {
    assert_eq!(extract_message(r#"{"message":"not found"}"#), "not found");
    assert_eq!(extract_message(" plain text "), "plain text");
  }

  #[test]
  fn empty_rejection_gets_default_message() {
    let response = LoginResponse {
      error: true,
      message: " ".to_string(),
      user: None,
    };
    assert_eq!(rejection_message(&response), "Unknown error");
  }

  #[test]
  fn unreachable_server_is_a_transport_error() {
    let client = ApiClient::new("http://127.0.0.1:9/", Duration::from_millis(300));
    let err = client.list_transactions("u1").unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
  }
}
