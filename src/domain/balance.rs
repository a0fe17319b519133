use crate::models::TransactionKind;

/// Signed amount for a new entry of the given kind.
pub fn signed_amount(kind: TransactionKind, magnitude: f64) -> f64 {
  match kind {
    TransactionKind::Expense => -magnitude.abs(),
    TransactionKind::Income => magnitude.abs(),
  }
}

/// An edited amount keeps the sign of the original entry.
pub fn keep_sign(original: f64, magnitude: f64) -> f64 {
  if original < 0.0 {
    -magnitude.abs()
  } else {
    magnitude.abs()
  }
}

pub fn after_add(balance: f64, amount: f64) -> f64 {
  balance + amount
}

pub fn after_edit(balance: f64, old_amount: f64, new_amount: f64) -> f64 {
  balance - old_amount + new_amount
}

/// Deleting an expense gives the money back; deleting income takes it away.
pub fn after_delete(balance: f64, amount: f64) -> f64 {
  balance - amount
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expense_and_income_signs() {
    assert_eq!(signed_amount(TransactionKind::Expense, 12.0), -12.0);
    assert_eq!(signed_amount(TransactionKind::Income, -12.0), 12.0);
  }

  #[test]
  fn edit_keeps_original_sign() {
    assert_eq!(keep_sign(-5.0, 8.0), -8.0);
    assert_eq!(keep_sign(5.0, 8.0), 8.0);
  }

  #[test]
  fn balance_arithmetic() {
    assert_eq!(after_add(100.0, -30.0), 70.0);
    assert_eq!(after_edit(70.0, -30.0, -10.0), 90.0);
    assert_eq!(after_delete(90.0, -10.0), 100.0);
    assert_eq!(after_delete(100.0, 25.0), 75.0);
  }
}
