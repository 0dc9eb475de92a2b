use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::value_objects::{InvoiceStatus, ValueObjectError};

/// Caller-facing error taxonomy. Only `Conflict` is worth retrying, and only
/// after reloading the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  InvalidArgument,
  InvalidState,
  Conflict,
  Internal,
}

#[derive(Debug, Error)]
pub enum LedgerError {
  #[error("Validation error: {0}")]
  Validation(#[from] ValueObjectError),

  #[error("Customer not found: {0}")]
  CustomerNotFound(Uuid),

  #[error("Invoice not found: {0}")]
  InvoiceNotFound(Uuid),

  #[error("Payment {payment_id} not found on invoice {invoice_id}")]
  PaymentNotFound { invoice_id: Uuid, payment_id: Uuid },

  #[error("An invoice needs at least one line item")]
  NoItems,

  #[error("Amount must be greater than zero")]
  NonPositiveAmount,

  #[error("Payment of {amount} exceeds outstanding amount {outstanding}")]
  ExceedsOutstanding {
    amount: Decimal,
    outstanding: Decimal,
  },

  #[error("Refund of {amount} exceeds paid amount {paid}")]
  ExceedsPaid { amount: Decimal, paid: Decimal },

  #[error("Only draft invoices can be issued (current status: {0:?})")]
  NotDraft(InvoiceStatus),

  #[error("Issue the invoice before taking payments against it")]
  LedgerEntryOnDraft,

  #[error("Cannot take payments against a cancelled invoice")]
  LedgerEntryOnCancelled,

  #[error("Cannot cancel an invoice that has payments (paid: {paid})")]
  CannotCancelWithPayments { paid: Decimal },

  #[error("Only a positive payment can be reversed")]
  NotAPayment(Uuid),

  #[error("Payment {0} was already reversed")]
  AlreadyReversed(Uuid),

  #[error("Nothing has been paid to reverse")]
  NothingToReverse,

  #[error("No paid amount to refund")]
  NothingToRefund,

  #[error("Duplicate payment reference for this invoice: {0}")]
  DuplicateReference(String),

  #[error("Invoice number '{0}' already exists")]
  InvoiceNumberExists(String),

  #[error("The invoice was updated by another request. Reload and try again")]
  VersionConflict,

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl LedgerError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      LedgerError::CustomerNotFound(_)
      | LedgerError::InvoiceNotFound(_)
      | LedgerError::PaymentNotFound { .. } => ErrorKind::NotFound,

      LedgerError::Validation(_)
      | LedgerError::NoItems
      | LedgerError::NonPositiveAmount
      | LedgerError::ExceedsOutstanding { .. }
      | LedgerError::ExceedsPaid { .. }
      | LedgerError::NotAPayment(_) => ErrorKind::InvalidArgument,

      LedgerError::NotDraft(_)
      | LedgerError::LedgerEntryOnDraft
      | LedgerError::LedgerEntryOnCancelled
      | LedgerError::CannotCancelWithPayments { .. }
      | LedgerError::NothingToReverse
      | LedgerError::NothingToRefund => ErrorKind::InvalidState,

      LedgerError::AlreadyReversed(_)
      | LedgerError::DuplicateReference(_)
      | LedgerError::InvoiceNumberExists(_)
      | LedgerError::VersionConflict => ErrorKind::Conflict,

      LedgerError::Database(_) | LedgerError::Internal(_) => ErrorKind::Internal,
    }
  }

  /// Conflicts are safe to retry after the caller reloads the invoice.
  pub fn is_retryable(&self) -> bool {
    self.kind() == ErrorKind::Conflict
  }
}
