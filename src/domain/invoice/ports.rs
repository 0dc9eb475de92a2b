use async_trait::async_trait;
use uuid::Uuid;

use super::entities::{Customer, Invoice, InvoiceItem, Payment};
use super::errors::LedgerError;
use super::value_objects::{InvoiceStatus, Version};

/// An invoice loaded together with its items and full payment stream, read
/// consistently within one store operation.
#[derive(Debug, Clone)]
pub struct InvoiceWithLedger {
  pub invoice: Invoice,
  pub items: Vec<InvoiceItem>,
  pub payments: Vec<Payment>,
}

/// Balance precondition re-verified by the store inside the same transaction
/// as a status write. Payments never bump the version token, so a cancel
/// cannot rely on the version check alone to see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceGuard {
  None,
  /// The ledger fold for the invoice must be <= 0 at write time.
  RequireNoNetPayments,
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
  /// Persists the invoice and its items atomically.
  async fn create(&self, invoice: Invoice, items: Vec<InvoiceItem>)
  -> Result<Invoice, LedgerError>;

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, LedgerError>;

  async fn find_with_ledger(&self, id: Uuid) -> Result<Option<InvoiceWithLedger>, LedgerError>;

  /// All invoices with their payment streams, newest first.
  async fn list_with_payments(&self) -> Result<Vec<(Invoice, Vec<Payment>)>, LedgerError>;

  /// Compare-and-swap write of the base status. Fails with `VersionConflict`
  /// when `expected_version` no longer matches, and enforces `guard` under
  /// the same transaction.
  async fn transition_status(
    &self,
    id: Uuid,
    new_status: InvoiceStatus,
    expected_version: Version,
    guard: BalanceGuard,
  ) -> Result<Invoice, LedgerError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
  /// Ledger entries for one invoice in capture order.
  async fn find_by_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>, LedgerError>;

  /// Appends one immutable entry. The entry's own shape decides the guards
  /// (payment, reversal, or refund), and every guard is re-evaluated against
  /// a ledger snapshot taken atomically with the insert: invoice must be
  /// issued; a payment must fit the outstanding amount and not reuse a
  /// non-blank reference; a reversal must target a live positive payment;
  /// a refund must not exceed the net paid amount.
  async fn append(&self, entry: Payment) -> Result<Payment, LedgerError>;
}

/// Lookup into the externally-owned customer registry.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
  async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, LedgerError>;
}
