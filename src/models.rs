use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
  pub api_base_url: String,
  pub receipt_base_folder: String,
  pub request_timeout_secs: u64,
}

/// The logged-in account as mirrored from the remote API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
  #[serde(rename = "_id")]
  pub id: String,
  pub username: String,
  pub email: String,
  #[serde(rename = "saldo", default)]
  pub balance: f64,
}

/// A single income or expense. Negative amounts are expenses, positive amounts income.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transaction {
  #[serde(rename = "_id", default)]
  pub id: String,
  #[serde(rename = "userId")]
  pub user_id: String,
  #[serde(rename = "titulo", default)]
  pub title: String,
  #[serde(rename = "valor")]
  pub amount: f64,
  #[serde(rename = "categoria", default = "default_category")]
  pub category: String,
  #[serde(rename = "data", default)]
  pub date: String,
  #[serde(rename = "fotoCaminho", default)]
  pub photo_path: Option<String>,
  #[serde(rename = "isSynced", default)]
  pub is_synced: bool,
}

fn default_category() -> String {
  crate::domain::validation::DEFAULT_CATEGORY.to_string()
}

impl Transaction {
  pub fn kind(&self) -> Option<TransactionKind> {
    TransactionKind::of(self.amount)
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
  Expense,
  Income,
}

impl TransactionKind {
  /// Zero amounts belong to neither side.
  pub fn of(amount: f64) -> Option<Self> {
    if amount < 0.0 {
      Some(TransactionKind::Expense)
    } else if amount > 0.0 {
      Some(TransactionKind::Income)
    } else {
      None
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      TransactionKind::Expense => "Expenses",
      TransactionKind::Income => "Income",
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisterRequest {
  pub username: String,
  pub email: String,
  pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginResponse {
  pub error: bool,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub user: Option<User>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BalanceRequest {
  pub saldo: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewExpenseInput {
  pub title: String,
  pub amount: String,
  pub category: Option<String>,
  pub receipt_source_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewIncomeInput {
  pub title: Option<String>,
  pub amount: String,
  pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum PhotoChange {
  Keep,
  Replace(String),
  Remove,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EditTransactionInput {
  pub id: String,
  pub title: String,
  pub amount: String,
  pub category: Option<String>,
  pub photo: PhotoChange,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategorySlice {
  pub label: String,
  pub total: f64,
  pub percent: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategoryBreakdown {
  pub kind: TransactionKind,
  pub total: f64,
  pub slices: Vec<CategorySlice>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Summary {
  pub income_total: f64,
  pub expense_total: f64,
  pub net: f64,
  pub slices: Vec<CategorySlice>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DayReport {
  pub date: String,
  pub transactions: Vec<Transaction>,
  pub summary: Summary,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Dashboard {
  pub user: User,
  pub transactions: Vec<Transaction>,
  pub expense_breakdown: CategoryBreakdown,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLogEntry {
  pub id: i64,
  pub ts: String,
  pub actor: Option<String>,
  pub action: String,
  pub entity_type: String,
  pub entity_id: Option<String>,
  pub payload_json: String,
}
