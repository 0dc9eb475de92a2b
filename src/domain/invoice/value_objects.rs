use chrono::NaiveDate;
use rand::{Rng, distributions::Alphanumeric};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueObjectError {
  #[error("Invalid invoice number: {0}")]
  InvalidInvoiceNumber(String),
  #[error("Invalid amount: {0}")]
  InvalidAmount(String),
  #[error("Invalid line item description: {0}")]
  InvalidDescription(String),
  #[error("Invalid quantity: {0}")]
  InvalidQuantity(String),
  #[error("Invalid VAT rate: {0}")]
  InvalidVatRate(String),
  #[error("Invalid payment method: {0}")]
  InvalidPaymentMethod(String),
  #[error("Invalid payment reference: {0}")]
  InvalidPaymentReference(String),
  #[error("Invalid invoice status: {0}")]
  InvalidStatus(String),
}

// Invoice Number - generated at creation, unique per store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
  pub fn new(value: String) -> Result<Self, ValueObjectError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
      return Err(ValueObjectError::InvalidInvoiceNumber(
        "Invoice number cannot be empty".to_string(),
      ));
    }
    if trimmed.len() > 100 {
      return Err(ValueObjectError::InvalidInvoiceNumber(
        "Invoice number cannot exceed 100 characters".to_string(),
      ));
    }
    Ok(Self(trimmed.to_string()))
  }

  /// Date-stamped number with a random suffix, e.g. `INV-20260215-K3F9QD`.
  /// Uniqueness is enforced by the store; a collision surfaces as a conflict.
  pub fn generate(issue_date: NaiveDate) -> Self {
    let suffix: String = rand::thread_rng()
      .sample_iter(&Alphanumeric)
      .take(6)
      .map(char::from)
      .collect();
    Self(format!(
      "INV-{}-{}",
      issue_date.format("%Y%m%d"),
      suffix.to_ascii_uppercase()
    ))
  }

  pub fn value(&self) -> &str {
    &self.0
  }

  pub fn into_inner(self) -> String {
    self.0
  }
}

impl fmt::Display for InvoiceNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

// Base invoice status - the only persisted states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
  Draft,
  Issued,
  Cancelled,
}

impl InvoiceStatus {
  pub fn can_transition_to(&self, new_status: InvoiceStatus) -> bool {
    match (self, new_status) {
      // Draft can only be issued
      (InvoiceStatus::Draft, InvoiceStatus::Issued) => true,
      // Cancellation is gated on the ledger balance, not the base status
      (_, InvoiceStatus::Cancelled) => true,
      _ => false,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      InvoiceStatus::Draft => "draft",
      InvoiceStatus::Issued => "issued",
      InvoiceStatus::Cancelled => "cancelled",
    }
  }
}

impl FromStr for InvoiceStatus {
  type Err = ValueObjectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "draft" => Ok(InvoiceStatus::Draft),
      "issued" => Ok(InvoiceStatus::Issued),
      "cancelled" => Ok(InvoiceStatus::Cancelled),
      _ => Err(ValueObjectError::InvalidStatus(format!(
        "Unknown status: {}",
        s
      ))),
    }
  }
}

// Display status - derived from base status + ledger fold, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
  Draft,
  Issued,
  PartiallyPaid,
  Paid,
  Cancelled,
}

impl DisplayStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      DisplayStatus::Draft => "draft",
      DisplayStatus::Issued => "issued",
      DisplayStatus::PartiallyPaid => "partially_paid",
      DisplayStatus::Paid => "paid",
      DisplayStatus::Cancelled => "cancelled",
    }
  }
}

// Money - non-negative decimal amount, at most 2 fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
  pub fn new(amount: Decimal) -> Result<Self, ValueObjectError> {
    if amount.is_sign_negative() {
      return Err(ValueObjectError::InvalidAmount(
        "Amount cannot be negative".to_string(),
      ));
    }
    if amount.scale() > 2 {
      return Err(ValueObjectError::InvalidAmount(
        "Amount cannot have more than 2 decimal places".to_string(),
      ));
    }
    Ok(Self(amount))
  }

  pub fn value(&self) -> Decimal {
    self.0
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.2}", self.0)
  }
}

// Quantity - positive whole units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(i32);

impl Quantity {
  pub fn new(value: i32) -> Result<Self, ValueObjectError> {
    if value <= 0 {
      return Err(ValueObjectError::InvalidQuantity(
        "Quantity must be positive".to_string(),
      ));
    }
    Ok(Self(value))
  }

  pub fn value(&self) -> i32 {
    self.0
  }

  pub fn as_decimal(&self) -> Decimal {
    Decimal::from(self.0)
  }
}

// VAT Rate - a fraction, e.g. 0.15 for 15%
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatRate(Decimal);

impl VatRate {
  pub fn new(value: Decimal) -> Result<Self, ValueObjectError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
      return Err(ValueObjectError::InvalidVatRate(
        "VAT rate must be a fraction between 0 and 1".to_string(),
      ));
    }
    if value.scale() > 4 {
      return Err(ValueObjectError::InvalidVatRate(
        "VAT rate cannot have more than 4 decimal places".to_string(),
      ));
    }
    Ok(Self(value))
  }

  pub fn value(&self) -> Decimal {
    self.0
  }
}

// Line Item Description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description(String);

impl Description {
  pub fn new(value: String) -> Result<Self, ValueObjectError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
      return Err(ValueObjectError::InvalidDescription(
        "Description cannot be empty".to_string(),
      ));
    }
    if trimmed.len() > 500 {
      return Err(ValueObjectError::InvalidDescription(
        "Description cannot exceed 500 characters".to_string(),
      ));
    }
    Ok(Self(trimmed.to_string()))
  }

  pub fn value(&self) -> &str {
    &self.0
  }
}

// Payment Method - free-form label, e.g. "EFT", "card"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod(String);

impl PaymentMethod {
  pub fn new(value: String) -> Result<Self, ValueObjectError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
      return Err(ValueObjectError::InvalidPaymentMethod(
        "Payment method cannot be empty".to_string(),
      ));
    }
    if trimmed.len() > 50 {
      return Err(ValueObjectError::InvalidPaymentMethod(
        "Payment method cannot exceed 50 characters".to_string(),
      ));
    }
    Ok(Self(trimmed.to_string()))
  }

  pub fn value(&self) -> &str {
    &self.0
  }
}

// Payment Reference - duplicate-detection key; blank input is treated as absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReference(String);

impl PaymentReference {
  pub fn new(value: String) -> Result<Self, ValueObjectError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
      return Err(ValueObjectError::InvalidPaymentReference(
        "Payment reference cannot be blank".to_string(),
      ));
    }
    if trimmed.len() > 100 {
      return Err(ValueObjectError::InvalidPaymentReference(
        "Payment reference cannot exceed 100 characters".to_string(),
      ));
    }
    Ok(Self(trimmed.to_string()))
  }

  /// Blank or whitespace-only input never participates in duplicate detection.
  pub fn from_input(value: Option<String>) -> Result<Option<Self>, ValueObjectError> {
    match value {
      Some(v) if !v.trim().is_empty() => Ok(Some(Self::new(v)?)),
      _ => Ok(None),
    }
  }

  pub fn value(&self) -> &str {
    &self.0
  }
}

// Optimistic concurrency token, owned and incremented by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version(i64);

impl Version {
  pub fn initial() -> Self {
    Self(0)
  }

  pub fn from_raw(value: i64) -> Self {
    Self(value)
  }

  pub fn value(&self) -> i64 {
    self.0
  }

  pub fn next(&self) -> Self {
    Self(self.0 + 1)
  }
}
