use chrono::NaiveDate;

use crate::error::AppError;

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const DEFAULT_CATEGORY: &str = "General";

pub fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
  NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
    .map_err(|_| AppError::new("INVALID_DATE", "Date must be DD/MM/YYYY"))
}

pub fn format_date(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

/// Parses a user-typed amount. Accepts `,` as decimal separator; the sign is ignored.
pub fn parse_amount(raw: &str) -> Result<f64, AppError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(AppError::new("MISSING_FIELDS", "Amount is required"));
  }
  let value: f64 = trimmed
    .replace(',', ".")
    .parse()
    .map_err(|_| AppError::new("INVALID_AMOUNT", format!("'{trimmed}' is not a number")))?;
  if !value.is_finite() || value == 0.0 {
    return Err(AppError::new("INVALID_AMOUNT", "Amount must be a non-zero number"));
  }
  Ok(value.abs())
}

pub fn require_text(value: &str, field: &str) -> Result<String, AppError> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    Err(AppError::new("MISSING_FIELDS", format!("{field} is required")))
  } else {
    Ok(trimmed.to_string())
  }
}

pub fn category_or_default(category: Option<&str>) -> String {
  match category.map(str::trim) {
    Some(value) if !value.is_empty() => value.to_string(),
    _ => DEFAULT_CATEGORY.to_string(),
  }
}

pub fn ensure_credentials(username: &str, password: &str) -> Result<(), AppError> {
  if username.trim().is_empty() || password.is_empty() {
    return Err(AppError::new("MISSING_FIELDS", "Fill in all fields"));
  }
  Ok(())
}

pub fn ensure_registration(username: &str, email: &str, password: &str) -> Result<(), AppError> {
  ensure_credentials(username, password)?;
  let email = email.trim();
  if email.is_empty() {
    return Err(AppError::new("MISSING_FIELDS", "Fill in all fields"));
  }
  if !email.contains('@') {
    return Err(AppError::new("INVALID_EMAIL", "Email address is not valid"));
  }
  Ok(())
}
