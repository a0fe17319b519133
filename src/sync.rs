//! Reconciliation of the local cache with the remote API.
//!
//! The server is the source of truth. A successful fetch replaces every
//! cached transaction with the remote list; there is no merge, so rows that
//! only exist locally (unsynced income, for instance) are dropped. A failed
//! fetch is logged and the cache is left exactly as it was; an unreadable
//! list is returned as an error instead of being treated as offline.

use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::api::ApiError;
use crate::audit::log::append_audit;
use crate::commands;
use crate::db;
use crate::error::AppError;
use crate::models::Dashboard;
use crate::store::transactions;
use crate::AppState;

const SYNC_ACTION: &str = "SYNC_REPLACE";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
  Replaced { count: usize, dropped_unsynced: usize },
  Offline { reason: String },
}

pub fn sync_transactions(state: &AppState) -> Result<SyncOutcome, AppError> {
  let user = commands::require_user(state)?;

  let remote = match state.api.list_transactions(&user.id) {
    Ok(remote) => remote,
    Err(err @ ApiError::Decode(_)) => {
      warn!("sync aborted, server sent an unreadable list: {err}");
      return Err(err.into());
    }
    Err(err) => {
      warn!("sync skipped, remote unavailable: {err}");
      return Ok(SyncOutcome::Offline {
        reason: err.to_string(),
      });
    }
  };

  let (count, dropped_unsynced) = db::with_conn(&state.db, |conn| {
    let dropped = transactions::list_transactions(conn)?
      .iter()
      .filter(|t| !t.is_synced)
      .count();
    let count = transactions::replace_all_transactions(conn, &remote)?;
    append_audit(
      conn,
      Some(&user.username),
      SYNC_ACTION,
      "TRANSACTION",
      None,
      serde_json::to_string(&serde_json::json!({
        "count": count,
        "dropped_unsynced": dropped,
      }))?,
    )?;
    Ok((count, dropped))
  })?;

  if dropped_unsynced > 0 {
    warn!("sync replaced {dropped_unsynced} unsynced local transactions");
  }
  info!("sync replaced local cache with {count} remote transactions");
  Ok(SyncOutcome::Replaced {
    count,
    dropped_unsynced,
  })
}

/// Shows what is cached, then tries to refresh it from the server.
/// The returned dashboard reflects the cache after the sync attempt.
pub fn refresh(state: &AppState) -> Result<(Dashboard, SyncOutcome), AppError> {
  let cached = commands::dashboard(state)?;
  info!(
    "cached: {} transactions, balance {:.2}",
    cached.transactions.len(),
    cached.user.balance
  );
  let outcome = sync_transactions(state)?;
  let dashboard = match outcome {
    SyncOutcome::Replaced { .. } => commands::dashboard(state)?,
    SyncOutcome::Offline { .. } => cached,
  };
  Ok((dashboard, outcome))
}

/// Timestamp of the last successful replace, if any.
pub fn last_sync_at(conn: &Connection) -> Result<Option<String>, AppError> {
  let ts = conn
    .query_row(
      "SELECT ts FROM audit_log WHERE action = ?1 ORDER BY id DESC LIMIT 1",
      params![SYNC_ACTION],
      |row| row.get::<_, String>(0),
    )
    .optional()?;
  Ok(ts)
}
