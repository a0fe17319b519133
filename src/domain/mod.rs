pub mod balance;
pub mod validation;
