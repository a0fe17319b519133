use std::collections::BTreeMap;

use crate::models::{CategoryBreakdown, CategorySlice, DayReport, Summary, Transaction, TransactionKind};

/// Groups one side (expenses or income) of `items` by category, summing
/// absolute amounts. Slices are ordered by total, largest first, then by name.
pub fn category_breakdown(items: &[Transaction], kind: TransactionKind) -> CategoryBreakdown {
  let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
  for item in items.iter().filter(|t| t.kind() == Some(kind)) {
    *by_category.entry(item.category.as_str()).or_insert(0.0) += item.amount.abs();
  }

  let total: f64 = by_category.values().sum();
  let mut slices: Vec<CategorySlice> = by_category
    .into_iter()
    .map(|(label, value)| CategorySlice {
      label: label.to_string(),
      total: value,
      percent: percent_of(value, total),
    })
    .collect();
  slices.sort_by(|a, b| b.total.total_cmp(&a.total));

  CategoryBreakdown { kind, total, slices }
}

/// Income against expenses. Sides with no movement get no slice.
pub fn summary(items: &[Transaction]) -> Summary {
  let income_total: f64 = items.iter().filter(|t| t.amount > 0.0).map(|t| t.amount).sum();
  let expense_total: f64 = items.iter().filter(|t| t.amount < 0.0).map(|t| t.amount.abs()).sum();
  let grand = income_total + expense_total;

  let mut slices = Vec::new();
  for (kind, value) in [(TransactionKind::Income, income_total), (TransactionKind::Expense, expense_total)] {
    if value > 0.0 {
      slices.push(CategorySlice {
        label: kind.label().to_string(),
        total: value,
        percent: percent_of(value, grand),
      });
    }
  }

  Summary {
    income_total,
    expense_total,
    net: income_total - expense_total,
    slices,
  }
}

pub fn day_report(items: &[Transaction], date: &str) -> DayReport {
  let transactions: Vec<Transaction> = items.iter().filter(|t| t.date == date).cloned().collect();
  let summary = summary(&transactions);
  DayReport {
    date: date.to_string(),
    transactions,
    summary,
  }
}

pub fn format_eur(value: f64) -> String {
  format!("{value:.2}€")
}

fn percent_of(value: f64, total: f64) -> f64 {
  if total.abs() < f64::EPSILON {
    0.0
  } else {
    value / total * 100.0
  }
}
