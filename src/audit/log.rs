use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::AuditLogEntry;

pub fn append_audit(
  conn: &Connection,
  actor: Option<&str>,
  action: &str,
  entity_type: &str,
  entity_id: Option<&str>,
  payload_json: String,
) -> Result<(), AppError> {
  let ts = Utc::now().to_rfc3339();
  conn.execute(
    "INSERT INTO audit_log (ts, actor, action, entity_type, entity_id, payload_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![ts, actor, action, entity_type, entity_id, payload_json],
  )?;
  Ok(())
}

/// Most recent entries first.
pub fn list_audit(conn: &Connection, limit: i64) -> Result<Vec<AuditLogEntry>, AppError> {
  let limit = if limit < 1 { 100 } else { limit };
  let mut stmt = conn.prepare(
    "SELECT id, ts, actor, action, entity_type, entity_id, payload_json
     FROM audit_log
     ORDER BY id DESC
     LIMIT ?1",
  )?;
  let rows = stmt.query_map(params![limit], |row| {
    Ok(AuditLogEntry {
      id: row.get(0)?,
      ts: row.get(1)?,
      actor: row.get(2)?,
      action: row.get(3)?,
      entity_type: row.get(4)?,
      entity_id: row.get(5)?,
      payload_json: row.get(6)?,
    })
  })?;

  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}
