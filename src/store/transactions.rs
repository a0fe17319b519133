use log::warn;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;
use crate::models::Transaction;

const SELECT_COLUMNS: &str =
  "SELECT id, user_id, title, amount, category, date, photo_path, is_synced FROM transactions";

/// Cached transactions, most recently stored first.
pub fn list_transactions(conn: &Connection) -> Result<Vec<Transaction>, AppError> {
  let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY seq DESC"))?;
  let rows = stmt.query_map([], |row| map_transaction_row(row))?;

  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

/// Transactions whose stored date string equals `date` exactly.
pub fn list_by_date(conn: &Connection, date: &str) -> Result<Vec<Transaction>, AppError> {
  let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE date = ?1 ORDER BY seq DESC"))?;
  let rows = stmt.query_map(params![date], |row| map_transaction_row(row))?;

  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

pub fn get_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>, AppError> {
  let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
  let item = stmt.query_row(params![id], |row| map_transaction_row(row)).optional()?;
  Ok(item)
}

/// Inserts, or overwrites the row with the same id while keeping its list position.
pub fn upsert_transaction(conn: &Connection, item: &Transaction) -> Result<(), AppError> {
  conn.execute(
    "INSERT INTO transactions (id, user_id, title, amount, category, date, photo_path, is_synced)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(id) DO UPDATE SET
       user_id = excluded.user_id,
       title = excluded.title,
       amount = excluded.amount,
       category = excluded.category,
       date = excluded.date,
       photo_path = excluded.photo_path,
       is_synced = excluded.is_synced",
    params![
      item.id,
      item.user_id,
      item.title,
      item.amount,
      item.category,
      item.date,
      item.photo_path,
      if item.is_synced { 1 } else { 0 }
    ],
  )?;
  Ok(())
}

pub fn mark_synced(conn: &Connection, id: &str) -> Result<(), AppError> {
  conn.execute("UPDATE transactions SET is_synced = 1 WHERE id = ?1", params![id])?;
  Ok(())
}

pub fn delete_transaction(conn: &Connection, id: &str) -> Result<usize, AppError> {
  Ok(conn.execute("DELETE FROM transactions WHERE id = ?1", params![id])?)
}

pub fn delete_all_transactions(conn: &Connection) -> Result<usize, AppError> {
  Ok(conn.execute("DELETE FROM transactions", [])?)
}

/// Drops every cached row and stores `remote` in its place, all marked synced.
/// Documents without an id are skipped. Returns the number of rows stored.
/// Runs in one SQLite transaction so readers never observe a half-replaced list.
pub fn replace_all_transactions(conn: &mut Connection, remote: &[Transaction]) -> Result<usize, AppError> {
  let tx = conn.transaction()?;
  tx.execute("DELETE FROM transactions", [])?;
  let mut stored = 0;
  for item in remote {
    if item.id.trim().is_empty() {
      warn!("skipping remote transaction without id: {:?}", item.title);
      continue;
    }
    let synced = Transaction {
      is_synced: true,
      ..item.clone()
    };
    upsert_transaction(&tx, &synced)?;
    stored += 1;
  }
  tx.commit()?;
  Ok(stored)
}

/// Every receipt path still referenced by a cached row.
pub fn referenced_photo_paths(conn: &Connection) -> Result<Vec<String>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT photo_path FROM transactions WHERE photo_path IS NOT NULL AND photo_path <> ''",
  )?;
  let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

  let mut paths = Vec::new();
  for row in rows {
    paths.push(row?);
  }
  Ok(paths)
}

fn map_transaction_row(row: &rusqlite::Row) -> Result<Transaction, rusqlite::Error> {
  Ok(Transaction {
    id: row.get(0)?,
    user_id: row.get(1)?,
    title: row.get(2)?,
    amount: row.get(3)?,
    category: row.get(4)?,
    date: row.get(5)?,
    photo_path: row.get(6)?,
    is_synced: row.get::<_, i64>(7)? == 1,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db;

  fn tx(id: &str, amount: f64, date: &str) -> Transaction {
    Transaction {
      id: id.to_string(),
      user_id: "u1".to_string(),
      title: format!("item {id}"),
      amount,
      category: "Food".to_string(),
      date: date.to_string(),
      photo_path: None,
      is_synced: false,
    }
  }

  #[test]
  fn list_is_newest_first_and_upsert_keeps_position() {
    let db = db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      upsert_transaction(conn, &tx("a", -1.0, "01/02/2026"))?;
      upsert_transaction(conn, &tx("b", -2.0, "01/02/2026"))?;
      upsert_transaction(conn, &Transaction { title: "renamed".to_string(), ..tx("a", -3.0, "01/02/2026") })?;

      let items = list_transactions(conn)?;
      let ids: Vec<&str> = items.iter().map(|t| t.id.as_str()).collect();
      assert_eq!(ids, vec!["b", "a"]);
      assert_eq!(items[1].title, "renamed");
      assert_eq!(items[1].amount, -3.0);
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn replace_all_drops_local_rows_and_marks_synced() {
    let db = db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      upsert_transaction(conn, &tx("local-only", -5.0, "01/02/2026"))?;
      let remote = vec![tx("r1", -1.0, "02/02/2026"), tx("r2", 7.0, "03/02/2026")];

      assert_eq!(replace_all_transactions(conn, &remote)?, 2);

      let items = list_transactions(conn)?;
      assert_eq!(items.len(), 2);
      assert!(items.iter().all(|t| t.is_synced));
      assert!(get_transaction(conn, "local-only")?.is_none());
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn replace_all_skips_documents_without_id() {
    let db = db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      let remote = vec![tx("", -1.0, "02/02/2026"), tx("r1", -2.0, "02/02/2026"), tx("  ", 3.0, "03/02/2026")];

      assert_eq!(replace_all_transactions(conn, &remote)?, 1);
      let items = list_transactions(conn)?;
      assert_eq!(items.len(), 1);
      assert_eq!(items[0].id, "r1");
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn replace_all_with_empty_remote_clears_cache() {
    let db = db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      upsert_transaction(conn, &tx("a", -1.0, "01/02/2026"))?;
      assert_eq!(replace_all_transactions(conn, &[])?, 0);
      assert!(list_transactions(conn)?.is_empty());
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn filters_by_exact_date_and_collects_photo_paths() {
    let db = db::open_in_memory().unwrap();
    db::with_conn(&db, |conn| {
      upsert_transaction(conn, &tx("a", -1.0, "01/02/2026"))?;
      upsert_transaction(conn, &Transaction {
        photo_path: Some("/r/one.jpg".to_string()),
        ..tx("b", -2.0, "02/02/2026")
      })?;
      upsert_transaction(conn, &Transaction {
        photo_path: Some(String::new()),
        ..tx("c", 4.0, "01/02/2026")
      })?;

      let day = list_by_date(conn, "01/02/2026")?;
      assert_eq!(day.len(), 2);
      assert_eq!(referenced_photo_paths(conn)?, vec!["/r/one.jpg".to_string()]);

      mark_synced(conn, "a")?;
      assert!(get_transaction(conn, "a")?.unwrap().is_synced);
      assert_eq!(delete_transaction(conn, "a")?, 1);
      assert_eq!(delete_all_transactions(conn)?, 2);
      Ok(())
    })
    .unwrap();
  }
}
