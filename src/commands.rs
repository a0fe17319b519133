use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use uuid::Uuid;

use crate::api::ApiError;
use crate::audit::log::{append_audit, list_audit};
use crate::db;
use crate::domain::{balance, validation};
use crate::error::AppError;
use crate::export::csv;
use crate::files::receipts;
use crate::models::*;
use crate::reports;
use crate::settings;
use crate::store::{transactions, users};
use crate::AppState;

pub fn get_settings(state: &AppState) -> Result<Settings, AppError> {
  db::with_conn(&state.db, |conn| {
    let mut settings = settings::get_settings(conn)?;
    if settings.receipt_base_folder.trim().is_empty() {
      settings.receipt_base_folder = state.receipt_base.to_string_lossy().to_string();
    }
    Ok(settings)
  })
}

pub fn set_api_url(state: &AppState, url: &str) -> Result<Settings, AppError> {
  let url = validation::require_text(url, "API URL")?;
  if !url.starts_with("http://") && !url.starts_with("https://") {
    return Err(AppError::new("INVALID_URL", "API URL must start with http:// or https://"));
  }
  db::with_conn(&state.db, |conn| {
    let mut current = settings::get_settings(conn)?;
    current.api_base_url = url;
    settings::update_settings(conn, &current)?;
    append_audit(conn, None, "UPDATE_SETTINGS", "SETTINGS", None, serde_json::to_string(&current)?)?;
    settings::get_settings(conn)
  })
}

pub fn login(state: &AppState, username: &str, password: &str) -> Result<User, AppError> {
  validation::ensure_credentials(username, password)?;
  let request = LoginRequest {
    username: username.trim().to_string(),
    password: password.to_string(),
  };

  let user = state.api.login(&request).map_err(|err| match err {
    ApiError::Transport(message) => AppError::new("NETWORK", message),
    other => {
      warn!("login rejected for {}: {other}", request.username);
      AppError::new("LOGIN_FAILED", other.to_string())
    }
  })?;

  db::with_conn(&state.db, |conn| {
    // Data from a previous account must not leak into this session.
    let tx = conn.transaction()?;
    users::delete_all_users(&tx)?;
    transactions::delete_all_transactions(&tx)?;
    users::insert_user(&tx, &user)?;
    append_audit(&tx, Some(&user.username), "LOGIN", "USER", Some(&user.id), "{}".to_string())?;
    tx.commit()?;
    Ok(())
  })?;

  info!("logged in as {} (balance {:.2})", user.username, user.balance);
  Ok(user)
}

pub fn register(state: &AppState, username: &str, email: &str, password: &str) -> Result<String, AppError> {
  validation::ensure_registration(username, email, password)?;
  let request = RegisterRequest {
    username: username.trim().to_string(),
    email: email.trim().to_string(),
    password: password.to_string(),
  };

  match state.api.register(&request) {
    Ok(message) => {
      info!("registered {}", request.username);
      Ok(message)
    }
    Err(ApiError::Transport(message)) => Err(AppError::new("NETWORK", message)),
    Err(err) => Err(AppError::new("REGISTER_FAILED", err.to_string())),
  }
}

pub fn logout(state: &AppState) -> Result<(), AppError> {
  db::with_conn(&state.db, |conn| {
    let actor = users::current_user(conn)?.map(|u| u.username);
    let tx = conn.transaction()?;
    users::delete_all_users(&tx)?;
    let dropped = transactions::delete_all_transactions(&tx)?;
    append_audit(&tx, actor.as_deref(), "LOGOUT", "USER", None, format!("{{\"dropped\":{dropped}}}"))?;
    tx.commit()?;
    info!("logged out, dropped {dropped} cached transactions");
    Ok(())
  })
}

pub fn current_user(state: &AppState) -> Result<Option<User>, AppError> {
  db::with_conn(&state.db, |conn| users::current_user(conn))
}

pub fn require_user(state: &AppState) -> Result<User, AppError> {
  current_user(state)?.ok_or_else(|| AppError::new("NOT_LOGGED_IN", "Log in first"))
}

pub fn list_transactions(state: &AppState) -> Result<Vec<Transaction>, AppError> {
  db::with_conn(&state.db, |conn| transactions::list_transactions(conn))
}

/// Records an expense. The remote API must accept it before anything is
/// written locally.
pub fn add_expense(state: &AppState, input: NewExpenseInput) -> Result<Transaction, AppError> {
  let title = validation::require_text(&input.title, "Title")?;
  let magnitude = validation::parse_amount(&input.amount)?;
  let user = require_user(state)?;

  let amount = balance::signed_amount(TransactionKind::Expense, magnitude);
  let new_balance = balance::after_add(user.balance, amount);

  let photo_path = match input.receipt_source_path.as_deref().map(str::trim) {
    Some(source) if !source.is_empty() => Some(receipts::import_receipt(source, &receipt_base(state)?)?),
    _ => None,
  };

  let item = Transaction {
    id: Uuid::new_v4().to_string(),
    user_id: user.id.clone(),
    title,
    amount,
    category: validation::category_or_default(input.category.as_deref()),
    date: today(),
    photo_path,
    is_synced: true,
  };

  push_balance(state, &user.id, new_balance);
  if let Err(err) = state.api.create_transaction(&item) {
    warn!("expense {} not accepted by server: {err}", item.id);
    discard_receipt(item.photo_path.as_deref());
    return Err(err.into());
  }

  db::with_conn(&state.db, |conn| {
    let tx = conn.transaction()?;
    users::update_balance(&tx, &user.id, new_balance)?;
    transactions::upsert_transaction(&tx, &item)?;
    append_audit(&tx, Some(&user.username), "CREATE_EXPENSE", "TRANSACTION", Some(&item.id), serde_json::to_string(&item)?)?;
    tx.commit()?;
    Ok(())
  })?;

  info!("expense {} recorded, balance now {:.2}", item.id, new_balance);
  Ok(item)
}

/// Records income locally first, then pushes it. Remote failures leave the
/// row unsynced.
pub fn add_income(state: &AppState, input: NewIncomeInput) -> Result<Transaction, AppError> {
  let magnitude = validation::parse_amount(&input.amount)?;
  let user = require_user(state)?;

  let amount = balance::signed_amount(TransactionKind::Income, magnitude);
  let new_balance = balance::after_add(user.balance, amount);
  let title = match input.title.as_deref().map(str::trim) {
    Some(value) if !value.is_empty() => value.to_string(),
    _ => "Income".to_string(),
  };

  let mut item = Transaction {
    id: Uuid::new_v4().to_string(),
    user_id: user.id.clone(),
    title,
    amount,
    category: validation::category_or_default(input.category.as_deref()),
    date: today(),
    photo_path: None,
    is_synced: false,
  };

  db::with_conn(&state.db, |conn| {
    let tx = conn.transaction()?;
    users::update_balance(&tx, &user.id, new_balance)?;
    transactions::upsert_transaction(&tx, &item)?;
    append_audit(&tx, Some(&user.username), "CREATE_INCOME", "TRANSACTION", Some(&item.id), serde_json::to_string(&item)?)?;
    tx.commit()?;
    Ok(())
  })?;

  push_balance(state, &user.id, new_balance);
  match state.api.create_transaction(&item) {
    Ok(()) => {
      db::with_conn(&state.db, |conn| transactions::mark_synced(conn, &item.id))?;
      item.is_synced = true;
    }
    Err(err) => warn!("income {} kept local only: {err}", item.id),
  }

  info!("income {} recorded, balance now {:.2}", item.id, new_balance);
  Ok(item)
}

/// Edits title, amount, category or receipt of a cached transaction. The
/// original sign and date are kept. The server must accept the change first.
pub fn edit_transaction(state: &AppState, input: EditTransactionInput) -> Result<Transaction, AppError> {
  let title = validation::require_text(&input.title, "Title")?;
  let magnitude = validation::parse_amount(&input.amount)?;
  let user = require_user(state)?;
  let original = get_transaction(state, &input.id)?;

  let amount = balance::keep_sign(original.amount, magnitude);
  let new_balance = balance::after_edit(user.balance, original.amount, amount);

  let photo_path = match &input.photo {
    PhotoChange::Keep => original.photo_path.clone(),
    PhotoChange::Remove => None,
    PhotoChange::Replace(source) => Some(receipts::import_receipt(source, &receipt_base(state)?)?),
  };

  let edited = Transaction {
    id: original.id.clone(),
    user_id: user.id.clone(),
    title,
    amount,
    category: match input.category.as_deref() {
      Some(category) => validation::category_or_default(Some(category)),
      None => original.category.clone(),
    },
    date: original.date.clone(),
    photo_path,
    is_synced: true,
  };

  push_balance(state, &user.id, new_balance);
  if let Err(err) = state.api.update_transaction(&edited.id, &edited) {
    warn!("edit of {} not accepted by server: {err}", edited.id);
    if matches!(input.photo, PhotoChange::Replace(_)) {
      discard_receipt(edited.photo_path.as_deref());
    }
    return Err(err.into());
  }

  db::with_conn(&state.db, |conn| {
    let tx = conn.transaction()?;
    users::update_balance(&tx, &user.id, new_balance)?;
    transactions::upsert_transaction(&tx, &edited)?;
    append_audit(&tx, Some(&user.username), "UPDATE_TRANSACTION", "TRANSACTION", Some(&edited.id), serde_json::to_string(&edited)?)?;
    tx.commit()?;
    Ok(())
  })?;

  info!("transaction {} updated, balance now {:.2}", edited.id, new_balance);
  Ok(edited)
}

/// Removes a transaction and restores its effect on the balance. Local
/// state changes immediately; remote calls are best effort. Returns the new balance.
pub fn delete_transaction(state: &AppState, id: &str) -> Result<f64, AppError> {
  let user = require_user(state)?;
  let item = get_transaction(state, id)?;
  let new_balance = balance::after_delete(user.balance, item.amount);

  db::with_conn(&state.db, |conn| {
    let tx = conn.transaction()?;
    users::update_balance(&tx, &user.id, new_balance)?;
    transactions::delete_transaction(&tx, &item.id)?;
    append_audit(&tx, Some(&user.username), "DELETE_TRANSACTION", "TRANSACTION", Some(&item.id), serde_json::to_string(&item)?)?;
    tx.commit()?;
    Ok(())
  })?;

  push_balance(state, &user.id, new_balance);
  if !item.id.is_empty() {
    if let Err(err) = state.api.delete_transaction(&item.id) {
      warn!("remote delete of {} failed: {err}", item.id);
    }
  }

  info!("transaction {} deleted, balance now {:.2}", item.id, new_balance);
  Ok(new_balance)
}

pub fn dashboard(state: &AppState) -> Result<Dashboard, AppError> {
  let user = require_user(state)?;
  let items = list_transactions(state)?;
  let expense_breakdown = reports::category_breakdown(&items, TransactionKind::Expense);
  Ok(Dashboard {
    user,
    transactions: items,
    expense_breakdown,
  })
}

pub fn category_report(state: &AppState, kind: TransactionKind) -> Result<CategoryBreakdown, AppError> {
  let items = list_transactions(state)?;
  Ok(reports::category_breakdown(&items, kind))
}

pub fn summary_report(state: &AppState) -> Result<Summary, AppError> {
  let items = list_transactions(state)?;
  Ok(reports::summary(&items))
}

pub fn day_report(state: &AppState, date: &str) -> Result<DayReport, AppError> {
  let date = validation::format_date(validation::parse_date(date)?);
  let items = db::with_conn(&state.db, |conn| transactions::list_by_date(conn, &date))?;
  Ok(reports::day_report(&items, &date))
}

pub fn export_csv(state: &AppState, path: &Path) -> Result<usize, AppError> {
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)?;
    }
  }
  db::with_conn(&state.db, |conn| csv::export_transactions_csv(conn, path))
}

pub fn prune_receipts(state: &AppState) -> Result<usize, AppError> {
  let base = receipt_base(state)?;
  let referenced = db::with_conn(&state.db, |conn| transactions::referenced_photo_paths(conn))?;
  let removed = receipts::prune_orphans(&base, &referenced)?;
  info!("pruned {removed} orphaned receipts");
  Ok(removed)
}

pub fn list_audit_log(state: &AppState, limit: i64) -> Result<Vec<AuditLogEntry>, AppError> {
  db::with_conn(&state.db, |conn| list_audit(conn, limit))
}

pub fn get_transaction(state: &AppState, id: &str) -> Result<Transaction, AppError> {
  let id = id.trim();
  if id.is_empty() {
    return Err(AppError::new("INVALID_ID", "Transaction id is required"));
  }
  db::with_conn(&state.db, |conn| transactions::get_transaction(conn, id))?
    .ok_or_else(|| AppError::new("NOT_FOUND", format!("Transaction {id} not found")))
}

/// Balance pushes never abort the calling operation.
fn push_balance(state: &AppState, user_id: &str, new_balance: f64) {
  if let Err(err) = state.api.update_balance(user_id, new_balance) {
    warn!("balance push for {user_id} failed: {err}");
  }
}

fn receipt_base(state: &AppState) -> Result<PathBuf, AppError> {
  let configured = get_settings(state)?.receipt_base_folder;
  let path = PathBuf::from(&configured);
  if configured.trim().is_empty() || !path.exists() {
    Ok(state.receipt_base.clone())
  } else {
    Ok(path)
  }
}

fn discard_receipt(path: Option<&str>) {
  if let Some(path) = path {
    if let Err(err) = fs::remove_file(path) {
      warn!("could not discard receipt {path}: {err}");
    }
  }
}

fn today() -> String {
  validation::format_date(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::{sample_user, state_with, FakeRemote};

  fn logged_in(balance: f64) -> (FakeRemote, AppState) {
    let remote = FakeRemote::with_user(sample_user(balance), "secret");
    let state = state_with(&remote);
    login(&state, "ana", "secret").unwrap();
    (remote, state)
  }

  fn expense(title: &str, amount: &str) -> NewExpenseInput {
    NewExpenseInput {
      title: title.to_string(),
      amount: amount.to_string(),
      category: Some("Food".to_string()),
      receipt_source_path: None,
    }
  }

  fn cached_balance(state: &AppState) -> f64 {
    require_user(state).unwrap().balance
  }

  #[test]
  fn login_wipes_previous_account_data() {
    let remote = FakeRemote::with_user(sample_user(50.0), "secret");
    let state = state_with(&remote);
    db::with_conn(&state.db, |conn| {
      users::insert_user(conn, &User { id: "old".to_string(), ..sample_user(1.0) })?;
      transactions::upsert_transaction(conn, &Transaction {
        id: "stale".to_string(),
        user_id: "old".to_string(),
        title: "stale".to_string(),
        amount: -1.0,
        category: "X".to_string(),
        date: "01/01/2026".to_string(),
        photo_path: None,
        is_synced: true,
      })
    })
    .unwrap();

    let user = login(&state, "ana", "secret").unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(cached_balance(&state), 50.0);
    assert!(list_transactions(&state).unwrap().is_empty());
  }

  #[test]
  fn login_errors_are_classified() {
    let remote = FakeRemote::with_user(sample_user(0.0), "secret");
    let state = state_with(&remote);
    assert!(login(&state, "", "x").unwrap_err().is("MISSING_FIELDS"));
    assert!(login(&state, "ana", "wrong").unwrap_err().is("LOGIN_FAILED"));
    remote.set_offline(true);
    assert!(login(&state, "ana", "secret").unwrap_err().is("NETWORK"));
    assert!(current_user(&state).unwrap().is_none());
  }

  #[test]
  fn register_reports_server_rejection() {
    let remote = FakeRemote::with_user(sample_user(0.0), "secret");
    let state = state_with(&remote);
    assert_eq!(register(&state, "rui", "rui@example.com", "pw").unwrap(), "User created");
    let err = register(&state, "rui", "rui@example.com", "pw").unwrap_err();
    assert!(err.is("REGISTER_FAILED"));
    assert!(err.message.contains("already exists"));
    assert!(current_user(&state).unwrap().is_none());
  }

  #[test]
  fn operations_require_a_session() {
    let remote = FakeRemote::with_user(sample_user(0.0), "secret");
    let state = state_with(&remote);
    assert!(add_expense(&state, expense("Lunch", "5")).unwrap_err().is("NOT_LOGGED_IN"));
  }

  #[test]
  fn expense_is_negative_and_reduces_balance() {
    let (remote, state) = logged_in(100.0);
    let item = add_expense(&state, expense("Lunch", "12,5")).unwrap();

    assert_eq!(item.amount, -12.5);
    assert!(item.is_synced);
    assert_eq!(item.category, "Food");
    assert_eq!(cached_balance(&state), 87.5);
    let remote_state = remote.state.lock().unwrap();
    assert_eq!(remote_state.balance_pushes, vec![87.5]);
    assert_eq!(remote_state.transactions.len(), 1);
  }

  #[test]
  fn expense_defaults_category() {
    let (_remote, state) = logged_in(10.0);
    let item = add_expense(&state, NewExpenseInput { category: None, ..expense("Bus", "2") }).unwrap();
    assert_eq!(item.category, validation::DEFAULT_CATEGORY);
  }

  #[test]
  fn rejected_expense_leaves_cache_untouched() {
    let (remote, state) = logged_in(100.0);
    remote.set_offline(true);
    assert!(add_expense(&state, expense("Lunch", "10")).unwrap_err().is("NETWORK"));

    remote.set_offline(false);
    remote.set_reject_writes(true);
    assert!(add_expense(&state, expense("Lunch", "10")).unwrap_err().is("REMOTE_REJECTED"));

    assert_eq!(cached_balance(&state), 100.0);
    assert!(list_transactions(&state).unwrap().is_empty());
  }

  #[test]
  fn expense_with_receipt_imports_photo() {
    let (_remote, state) = logged_in(10.0);
    let photo = state.app_dir.join("capture.jpg");
    std::fs::write(&photo, b"jpeg").unwrap();

    let item = add_expense(&state, NewExpenseInput {
      receipt_source_path: Some(photo.to_string_lossy().to_string()),
      ..expense("Groceries", "4")
    })
    .unwrap();

    let stored = PathBuf::from(item.photo_path.unwrap());
    assert!(stored.starts_with(&state.receipt_base));
    assert!(stored.exists());
  }

  #[test]
  fn income_is_applied_locally_even_when_offline() {
    let (remote, state) = logged_in(20.0);
    remote.set_offline(true);

    let item = add_income(&state, NewIncomeInput {
      title: None,
      amount: "30".to_string(),
      category: None,
    })
    .unwrap();

    assert_eq!(item.amount, 30.0);
    assert_eq!(item.title, "Income");
    assert!(!item.is_synced);
    assert_eq!(cached_balance(&state), 50.0);
    let cached = list_transactions(&state).unwrap();
    assert_eq!(cached.len(), 1);
    assert!(!cached[0].is_synced);
  }

  #[test]
  fn income_is_marked_synced_when_server_accepts() {
    let (remote, state) = logged_in(0.0);
    let item = add_income(&state, NewIncomeInput {
      title: Some("Salary".to_string()),
      amount: "1000".to_string(),
      category: Some("Work".to_string()),
    })
    .unwrap();
    assert!(item.is_synced);
    assert!(list_transactions(&state).unwrap()[0].is_synced);
    assert_eq!(remote.state.lock().unwrap().balance_pushes, vec![1000.0]);
  }

  #[test]
  fn edit_keeps_sign_date_and_rebalances() {
    let (_remote, state) = logged_in(100.0);
    let original = add_expense(&state, expense("Lunch", "30")).unwrap();
    assert_eq!(cached_balance(&state), 70.0);

    let edited = edit_transaction(&state, EditTransactionInput {
      id: original.id.clone(),
      title: "Dinner".to_string(),
      amount: "10".to_string(),
      category: Some("Restaurants".to_string()),
      photo: PhotoChange::Keep,
    })
    .unwrap();

    assert_eq!(edited.amount, -10.0);
    assert_eq!(edited.date, original.date);
    assert_eq!(cached_balance(&state), 90.0);
    let cached = list_transactions(&state).unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].title, "Dinner");
  }

  #[test]
  fn edit_without_category_keeps_the_original_one() {
    let (_remote, state) = logged_in(100.0);
    let original = add_expense(&state, expense("Lunch", "30")).unwrap();

    let edited = edit_transaction(&state, EditTransactionInput {
      id: original.id.clone(),
      title: "Lunch".to_string(),
      amount: "20".to_string(),
      category: None,
      photo: PhotoChange::Keep,
    })
    .unwrap();

    assert_eq!(edited.category, "Food");
    assert_eq!(get_transaction(&state, &original.id).unwrap().category, "Food");
  }

  #[test]
  fn rejected_edit_changes_nothing_locally() {
    let (remote, state) = logged_in(100.0);
    let original = add_expense(&state, expense("Lunch", "30")).unwrap();
    remote.set_reject_writes(true);

    let err = edit_transaction(&state, EditTransactionInput {
      id: original.id.clone(),
      title: "Dinner".to_string(),
      amount: "10".to_string(),
      category: None,
      photo: PhotoChange::Remove,
    })
    .unwrap_err();

    assert!(err.is("REMOTE_REJECTED"));
    assert_eq!(cached_balance(&state), 70.0);
    assert_eq!(list_transactions(&state).unwrap()[0].title, "Lunch");
  }

  #[test]
  fn delete_restores_balance_even_offline() {
    let (remote, state) = logged_in(100.0);
    let item = add_expense(&state, expense("Lunch", "25")).unwrap();
    remote.set_offline(true);

    let new_balance = delete_transaction(&state, &item.id).unwrap();
    assert_eq!(new_balance, 100.0);
    assert_eq!(cached_balance(&state), 100.0);
    assert!(list_transactions(&state).unwrap().is_empty());
    assert!(remote.state.lock().unwrap().deleted.is_empty());
  }

  #[test]
  fn delete_unknown_transaction_fails() {
    let (_remote, state) = logged_in(0.0);
    assert!(delete_transaction(&state, "nope").unwrap_err().is("NOT_FOUND"));
    assert!(delete_transaction(&state, " ").unwrap_err().is("INVALID_ID"));
  }

  #[test]
  fn logout_clears_session_and_cache() {
    let (_remote, state) = logged_in(10.0);
    add_expense(&state, expense("Lunch", "1")).unwrap();
    logout(&state).unwrap();
    assert!(current_user(&state).unwrap().is_none());
    assert!(list_transactions(&state).unwrap().is_empty());
    let actions: Vec<String> = list_audit_log(&state, 10).unwrap().into_iter().map(|e| e.action).collect();
    assert_eq!(actions.first().map(String::as_str), Some("LOGOUT"));
  }

  #[test]
  fn day_report_normalizes_date_input() {
    let (_remote, state) = logged_in(100.0);
    let item = add_expense(&state, expense("Lunch", "5")).unwrap();
    let report = day_report(&state, &item.date).unwrap();
    assert_eq!(report.transactions.len(), 1);
    assert_eq!(report.summary.expense_total, 5.0);
    assert!(day_report(&state, "yesterday").unwrap_err().is("INVALID_DATE"));
  }

  #[test]
  fn api_url_must_be_http() {
    let (_remote, state) = logged_in(0.0);
    assert!(set_api_url(&state, "ftp://x").unwrap_err().is("INVALID_URL"));
    if std::env::var("ECOWALLET_API_URL").is_err() {
      let updated = set_api_url(&state, "http://localhost:3000").unwrap();
      assert_eq!(updated.api_base_url, "http://localhost:3000/");
    }
  }
}
