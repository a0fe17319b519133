use std::fs::File;
use std::io::Write;
use std::path::Path;

use rusqlite::Connection;

use crate::error::AppError;
use crate::store::transactions;

/// Writes the cached transaction list to `path`. Returns the number of rows written.
pub fn export_transactions_csv(conn: &Connection, path: &Path) -> Result<usize, AppError> {
  let items = transactions::list_transactions(conn)?;
  let mut file = File::create(path)?;
  writeln!(file, "id,date,title,category,amount,type,photo_path,synced")?;

  for item in &items {
    let kind = item.kind().map(|k| k.label()).unwrap_or("");
    writeln!(
      file,
      "{},{},{},{},{:.2},{},{},{}",
      escape_csv(&item.id),
      escape_csv(&item.date),
      escape_csv(&item.title),
      escape_csv(&item.category),
      item.amount,
      kind,
      escape_csv(item.photo_path.as_deref().unwrap_or("")),
      item.is_synced
    )?;
  }

  Ok(items.len())
}

fn escape_csv(value: &str) -> String {
  if value.contains(',') || value.contains('"') || value.contains('\n') {
    format!("\"{}\"", value.replace('"', "\"\""))
  } else {
    value.to_string()
  }
}
