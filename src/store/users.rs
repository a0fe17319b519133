use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;
use crate::models::User;

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), AppError> {
  conn.execute(
    "INSERT OR REPLACE INTO users (id, username, email, balance) VALUES (?1, ?2, ?3, ?4)",
    params![user.id, user.username, user.email, user.balance],
  )?;
  Ok(())
}

/// The session user, if anyone is logged in.
pub fn current_user(conn: &Connection) -> Result<Option<User>, AppError> {
  let user = conn
    .query_row(
      "SELECT id, username, email, balance FROM users LIMIT 1",
      [],
      |row| {
        Ok(User {
          id: row.get(0)?,
          username: row.get(1)?,
          email: row.get(2)?,
          balance: row.get(3)?,
        })
      },
    )
    .optional()?;
  Ok(user)
}

pub fn update_balance(conn: &Connection, user_id: &str, balance: f64) -> Result<(), AppError> {
  let changed = conn.execute(
    "UPDATE users SET balance = ?1 WHERE id = ?2",
    params![balance, user_id],
  )?;
  if changed == 0 {
    return Err(AppError::new("NOT_FOUND", format!("User {user_id} not cached")));
  }
  Ok(())
}

pub fn delete_all_users(conn: &Connection) -> Result<usize, AppError> {
  Ok(conn.execute("DELETE FROM users", [])?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db;

  fn user() -> User {
    User {
      id: "u1".to_string(),
      username: "ana".to_string(),
      email: "ana@example.com".to_string(),
      balance: 10.0,
    }
  }

  #[test]
  fn insert_replaces_and_updates_balance() {
    let db = db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      assert!(current_user(conn)?.is_none());
      insert_user(conn, &user())?;
      insert_user(conn, &User { balance: 20.0, ..user() })?;
      update_balance(conn, "u1", 42.5)?;

      let cached = current_user(conn)?.unwrap();
      assert_eq!(cached.balance, 42.5);
      assert_eq!(delete_all_users(conn)?, 1);
      assert!(current_user(conn)?.is_none());
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn balance_update_for_unknown_user_fails() {
    let db = db::open_in_memory().unwrap();
    let err = db::with_conn(&db, |conn| update_balance(conn, "ghost", 1.0)).unwrap_err();
    assert!(err.is("NOT_FOUND"));
  }
}
