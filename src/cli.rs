use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands;
use crate::db;
use crate::error::AppError;
use crate::models::{
  CategoryBreakdown, EditTransactionInput, NewExpenseInput, NewIncomeInput, PhotoChange, Summary, Transaction,
  TransactionKind,
};
use crate::reports::format_eur;
use crate::sync::{self, SyncOutcome};
use crate::AppState;

#[derive(Parser, Debug)]
#[clap(name = "ecowallet", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
  /// Data directory holding the local cache and receipts.
  #[clap(long, global = true, env = "ECOWALLET_HOME")]
  pub home: Option<PathBuf>,

  #[clap(subcommand)]
  pub command: Command,
}

impl Cli {
  pub fn init() -> Self {
    Self::parse()
  }
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Create an account on the server
  Register(Register),
  /// Log in, replacing any cached account, and sync
  Login(Login),
  /// Forget the session and every cached transaction
  Logout,
  /// Show the cached user
  Whoami,
  /// Show the cached balance
  Balance,
  /// Show cached data, then refresh it from the server
  Overview,
  /// List cached transactions
  List(ListTransactions),
  #[clap(name = "add-expense")]
  AddExpense(AddExpense),
  #[clap(name = "add-income")]
  AddIncome(AddIncome),
  Edit(EditTransaction),
  Delete(DeleteTransaction),
  /// Replace the cached transactions with the server's list
  Sync,
  #[clap(subcommand)]
  Report(Report),
  #[clap(name = "export-csv")]
  ExportCsv(ExportCsv),
  #[clap(subcommand)]
  Receipts(Receipts),
  #[clap(subcommand)]
  Settings(SettingsCommand),
  /// Show recent local audit entries
  Audit(Audit),
}

#[derive(Args, Debug)]
pub struct Register {
  pub username: String,
  pub email: String,
  #[clap(long)]
  pub password: String,
}

#[derive(Args, Debug)]
pub struct Login {
  pub username: String,
  #[clap(long)]
  pub password: String,
}

#[derive(Args, Debug)]
pub struct ListTransactions {
  /// Only transactions of this day (DD/MM/YYYY)
  #[clap(long)]
  pub date: Option<String>,
}

#[derive(Args, Debug)]
pub struct AddExpense {
  pub title: String,
  pub amount: String,
  #[clap(long)]
  pub category: Option<String>,
  /// Photo of the receipt to attach
  #[clap(long)]
  pub receipt: Option<String>,
}

#[derive(Args, Debug)]
pub struct AddIncome {
  pub amount: String,
  #[clap(long)]
  pub title: Option<String>,
  #[clap(long)]
  pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditTransaction {
  pub id: String,
  #[clap(long)]
  pub title: Option<String>,
  #[clap(long)]
  pub amount: Option<String>,
  #[clap(long)]
  pub category: Option<String>,
  #[clap(long, conflicts_with = "remove_receipt")]
  pub receipt: Option<String>,
  #[clap(long)]
  pub remove_receipt: bool,
}

#[derive(Args, Debug)]
pub struct DeleteTransaction {
  pub id: String,
}

#[derive(Subcommand, Debug)]
pub enum Report {
  /// Category breakdown of expenses (or income)
  Categories {
    #[clap(long)]
    income: bool,
  },
  /// Income against expenses
  Summary,
  /// Transactions and totals for one day (DD/MM/YYYY)
  Day { date: String },
}

#[derive(Args, Debug)]
pub struct ExportCsv {
  pub path: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Receipts {
  /// Delete receipt files no cached transaction refers to
  Prune,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
  Show,
  #[clap(name = "set-api-url")]
  SetApiUrl { url: String },
}

#[derive(Args, Debug)]
pub struct Audit {
  #[clap(long, default_value_t = 20)]
  pub limit: i64,
}

impl Command {
  pub fn run(self, state: &AppState) -> Result<(), AppError> {
    match self {
      Command::Register(cmd) => {
        let message = commands::register(state, &cmd.username, &cmd.email, &cmd.password)?;
        println!("Registered. {message}");
      }
      Command::Login(cmd) => {
        let user = commands::login(state, &cmd.username, &cmd.password)?;
        println!("Logged in as {}", user.username);
        print_sync(&sync::sync_transactions(state)?);
        println!("Balance: {}", format_eur(commands::require_user(state)?.balance));
      }
      Command::Logout => {
        commands::logout(state)?;
        println!("Logged out");
      }
      Command::Whoami => match commands::current_user(state)? {
        Some(user) => println!("{} <{}> ({})", user.username, user.email, user.id),
        None => println!("Not logged in"),
      },
      Command::Balance => {
        println!("{}", format_eur(commands::require_user(state)?.balance));
      }
      Command::Overview => {
        let (dashboard, outcome) = sync::refresh(state)?;
        print_sync(&outcome);
        println!("{} - balance {}", dashboard.user.username, format_eur(dashboard.user.balance));
        print_breakdown(&dashboard.expense_breakdown);
        print_transactions(&dashboard.transactions);
      }
      Command::List(cmd) => {
        let items = match cmd.date {
          Some(date) => commands::day_report(state, &date)?.transactions,
          None => commands::list_transactions(state)?,
        };
        print_transactions(&items);
      }
      Command::AddExpense(cmd) => {
        let item = commands::add_expense(
          state,
          NewExpenseInput {
            title: cmd.title,
            amount: cmd.amount,
            category: cmd.category,
            receipt_source_path: cmd.receipt,
          },
        )?;
        println!("Expense {} recorded: {}", item.id, format_eur(item.amount));
      }
      Command::AddIncome(cmd) => {
        let item = commands::add_income(
          state,
          NewIncomeInput {
            title: cmd.title,
            amount: cmd.amount,
            category: cmd.category,
          },
        )?;
        let note = if item.is_synced { "" } else { " (not yet on server)" };
        println!("Income {} recorded: {}{note}", item.id, format_eur(item.amount));
      }
      Command::Edit(cmd) => {
        let current = commands::get_transaction(state, &cmd.id)?;
        let photo = match (cmd.receipt, cmd.remove_receipt) {
          (Some(path), _) => PhotoChange::Replace(path),
          (None, true) => PhotoChange::Remove,
          (None, false) => PhotoChange::Keep,
        };
        let item = commands::edit_transaction(
          state,
          EditTransactionInput {
            id: current.id,
            title: cmd.title.unwrap_or(current.title),
            amount: cmd.amount.unwrap_or_else(|| current.amount.abs().to_string()),
            category: cmd.category.or(Some(current.category)),
            photo,
          },
        )?;
        println!("Updated {}: {} {}", item.id, item.title, format_eur(item.amount));
      }
      Command::Delete(cmd) => {
        let balance = commands::delete_transaction(state, &cmd.id)?;
        println!("Deleted. Balance: {}", format_eur(balance));
      }
      Command::Sync => {
        print_sync(&sync::sync_transactions(state)?);
      }
      Command::Report(report) => match report {
        Report::Categories { income } => {
          let kind = if income { TransactionKind::Income } else { TransactionKind::Expense };
          print_breakdown(&commands::category_report(state, kind)?);
        }
        Report::Summary => print_summary(&commands::summary_report(state)?),
        Report::Day { date } => {
          let report = commands::day_report(state, &date)?;
          println!("Report for {}", report.date);
          print_summary(&report.summary);
          print_transactions(&report.transactions);
        }
      },
      Command::ExportCsv(cmd) => {
        let rows = commands::export_csv(state, &cmd.path)?;
        println!("Wrote {rows} transactions to {}", cmd.path.display());
      }
      Command::Receipts(Receipts::Prune) => {
        println!("Removed {} orphaned receipts", commands::prune_receipts(state)?);
      }
      Command::Settings(SettingsCommand::Show) => {
        let settings = commands::get_settings(state)?;
        let last_sync = db::with_conn(&state.db, |conn| sync::last_sync_at(conn))?;
        println!("api_base_url         {}", settings.api_base_url);
        println!("receipt_base_folder  {}", settings.receipt_base_folder);
        println!("request_timeout_secs {}", settings.request_timeout_secs);
        println!("last_sync_at         {}", last_sync.unwrap_or_else(|| "never".to_string()));
      }
      Command::Settings(SettingsCommand::SetApiUrl { url }) => {
        let settings = commands::set_api_url(state, &url)?;
        println!("API URL set to {}", settings.api_base_url);
      }
      Command::Audit(cmd) => {
        for entry in commands::list_audit_log(state, cmd.limit)? {
          println!(
            "{:<32}\t{:<20}\t{:<12}\t{}",
            entry.ts,
            entry.action,
            entry.actor.unwrap_or_default(),
            entry.entity_id.unwrap_or_default()
          );
        }
      }
    }
    Ok(())
  }
}

fn print_sync(outcome: &SyncOutcome) {
  match outcome {
    SyncOutcome::Replaced { count, dropped_unsynced } => {
      println!("Synced {count} transactions from server");
      if *dropped_unsynced > 0 {
        println!("{dropped_unsynced} local-only transactions were replaced");
      }
    }
    SyncOutcome::Offline { reason } => println!("Working offline: {reason}"),
  }
}

fn print_transactions(items: &[Transaction]) {
  if items.is_empty() {
    println!("No transactions");
    return;
  }
  println!(
    "{:<36}\t{:<10}\t{:<24}\t{:<16}\t{:>10}\t{}",
    "ID", "Date", "Title", "Category", "Amount", "Receipt"
  );
  println!("{:-<120}", "-");
  for item in items {
    println!(
      "{:<36}\t{:<10}\t{:<24}\t{:<16}\t{:>10}\t{}",
      item.id,
      item.date,
      item.title,
      item.category,
      format_eur(item.amount),
      if item.photo_path.is_some() { "yes" } else { "" }
    );
  }
}

fn print_breakdown(breakdown: &CategoryBreakdown) {
  if breakdown.slices.is_empty() {
    println!("No data");
    return;
  }
  println!("{} {}", breakdown.kind.label(), format_eur(breakdown.total));
  for slice in &breakdown.slices {
    println!("  {:<20} {:>10} {:>6.1}%", slice.label, format_eur(slice.total), slice.percent);
  }
}

fn print_summary(summary: &Summary) {
  if summary.slices.is_empty() {
    println!("No data");
    return;
  }
  println!("Income   {}", format_eur(summary.income_total));
  println!("Expenses {}", format_eur(summary.expense_total));
  println!("Net      {}", format_eur(summary.net));
  for slice in &summary.slices {
    println!("  {:<10} {:>6.1}%", slice.label, slice.percent);
  }
}
