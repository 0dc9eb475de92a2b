use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::invoice::{
  BalanceGuard, Customer, CustomerDirectory, Invoice, InvoiceItem, InvoiceRepository,
  InvoiceStatus, InvoiceWithLedger, LedgerError, Payment, PaymentRepository, Version,
};

/// In-memory ledger store. One mutex over the whole store is the
/// serialization point, so every operation observes and mutates a consistent
/// snapshot - the same transaction boundary the Postgres adapter gets from
/// row locks.
pub struct MemoryLedgerStore {
  inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
  customers: HashMap<Uuid, Customer>,
  invoices: HashMap<Uuid, Invoice>,
  items: HashMap<Uuid, Vec<InvoiceItem>>,
  payments: HashMap<Uuid, Vec<Payment>>,
}

impl MemoryLedgerStore {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(StoreInner::default()),
    }
  }

  pub fn insert_customer(&self, customer: Customer) {
    self.lock().customers.insert(customer.id, customer);
  }

  fn lock(&self) -> MutexGuard<'_, StoreInner> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl Default for MemoryLedgerStore {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl CustomerDirectory for MemoryLedgerStore {
  async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, LedgerError> {
    Ok(self.lock().customers.get(&id).cloned())
  }
}

#[async_trait]
impl InvoiceRepository for MemoryLedgerStore {
  async fn create(
    &self,
    invoice: Invoice,
    items: Vec<InvoiceItem>,
  ) -> Result<Invoice, LedgerError> {
    let mut inner = self.lock();

    if inner
      .invoices
      .values()
      .any(|existing| existing.invoice_number == invoice.invoice_number)
    {
      return Err(LedgerError::InvoiceNumberExists(
        invoice.invoice_number.value().to_string(),
      ));
    }

    inner.items.insert(invoice.id, items);
    inner.payments.entry(invoice.id).or_default();
    inner.invoices.insert(invoice.id, invoice.clone());

    Ok(invoice)
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, LedgerError> {
    Ok(self.lock().invoices.get(&id).cloned())
  }

  async fn find_with_ledger(&self, id: Uuid) -> Result<Option<InvoiceWithLedger>, LedgerError> {
    let inner = self.lock();

    Ok(inner.invoices.get(&id).map(|invoice| InvoiceWithLedger {
      invoice: invoice.clone(),
      items: inner.items.get(&id).cloned().unwrap_or_default(),
      payments: inner.payments.get(&id).cloned().unwrap_or_default(),
    }))
  }

  async fn list_with_payments(&self) -> Result<Vec<(Invoice, Vec<Payment>)>, LedgerError> {
    let inner = self.lock();

    let mut rows: Vec<(Invoice, Vec<Payment>)> = inner
      .invoices
      .values()
      .map(|invoice| {
        (
          invoice.clone(),
          inner.payments.get(&invoice.id).cloned().unwrap_or_default(),
        )
      })
      .collect();

    rows.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
    Ok(rows)
  }

  async fn transition_status(
    &self,
    id: Uuid,
    new_status: InvoiceStatus,
    expected_version: Version,
    guard: BalanceGuard,
  ) -> Result<Invoice, LedgerError> {
    let mut inner = self.lock();

    let paid: Decimal = inner
      .payments
      .get(&id)
      .map(|entries| entries.iter().map(|entry| entry.amount).sum())
      .unwrap_or(Decimal::ZERO);

    let invoice = inner
      .invoices
      .get_mut(&id)
      .ok_or(LedgerError::InvoiceNotFound(id))?;

    if invoice.version != expected_version {
      return Err(LedgerError::VersionConflict);
    }

    if guard == BalanceGuard::RequireNoNetPayments && paid > Decimal::ZERO {
      return Err(LedgerError::CannotCancelWithPayments { paid });
    }

    invoice.status = new_status;
    invoice.version = invoice.version.next();

    Ok(invoice.clone())
  }
}

#[async_trait]
impl PaymentRepository for MemoryLedgerStore {
  async fn find_by_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>, LedgerError> {
    Ok(
      self
        .lock()
        .payments
        .get(&invoice_id)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn append(&self, entry: Payment) -> Result<Payment, LedgerError> {
    let mut inner = self.lock();

    let invoice = inner
      .invoices
      .get(&entry.invoice_id)
      .cloned()
      .ok_or(LedgerError::InvoiceNotFound(entry.invoice_id))?;

    match invoice.status {
      InvoiceStatus::Cancelled => return Err(LedgerError::LedgerEntryOnCancelled),
      InvoiceStatus::Draft => return Err(LedgerError::LedgerEntryOnDraft),
      InvoiceStatus::Issued => {}
    }

    let entries = inner.payments.entry(entry.invoice_id).or_default();
    let paid: Decimal = entries.iter().map(|existing| existing.amount).sum();

    if entry.amount > Decimal::ZERO {
      if paid + entry.amount > invoice.total {
        return Err(LedgerError::ExceedsOutstanding {
          amount: entry.amount,
          outstanding: invoice.total - paid,
        });
      }
      if let Some(reference) = &entry.reference {
        if entries
          .iter()
          .any(|existing| existing.reference.as_ref() == Some(reference))
        {
          return Err(LedgerError::DuplicateReference(
            reference.value().to_string(),
          ));
        }
      }
    } else if let Some(target) = entry.reversed_payment_id {
      let original_amount = entries
        .iter()
        .find(|existing| existing.id == target)
        .map(|existing| existing.amount)
        .ok_or(LedgerError::PaymentNotFound {
          invoice_id: entry.invoice_id,
          payment_id: target,
        })?;

      if original_amount <= Decimal::ZERO {
        return Err(LedgerError::NotAPayment(target));
      }
      if entries
        .iter()
        .any(|existing| existing.reversed_payment_id == Some(target))
      {
        return Err(LedgerError::AlreadyReversed(target));
      }
      if paid <= Decimal::ZERO {
        return Err(LedgerError::NothingToReverse);
      }
    } else {
      if paid <= Decimal::ZERO {
        return Err(LedgerError::NothingToRefund);
      }
      if -entry.amount > paid {
        return Err(LedgerError::ExceedsPaid {
          amount: -entry.amount,
          paid,
        });
      }
    }

    entries.push(entry.clone());
    Ok(entry)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::invoice::{
    Description, InvoiceNumber, InvoiceTotals, LineInput, Money, PaymentMethod, Quantity, VatRate,
  };
  use chrono::NaiveDate;
  use rust_decimal_macros::dec;

  fn invoice_with_total() -> Invoice {
    let lines: Vec<LineInput> = vec![(
      Description::new("Services".to_string()).unwrap(),
      Quantity::new(1).unwrap(),
      Money::new(dec!(100.00)).unwrap(),
      VatRate::new(dec!(0.15)).unwrap(),
    )];
    Invoice::new(
      Uuid::new_v4(),
      InvoiceNumber::generate(NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()),
      NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
      NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
      InvoiceTotals::calculate(&lines),
      Uuid::new_v4(),
    )
  }

  fn payment(invoice: &Invoice, amount: Decimal) -> Payment {
    Payment::capture(
      invoice.id,
      amount,
      PaymentMethod::new("EFT".to_string()).unwrap(),
      None,
      Uuid::new_v4(),
    )
  }

  async fn issued(store: &MemoryLedgerStore) -> Invoice {
    let invoice = invoice_with_total();
    let created = store.create(invoice, vec![]).await.unwrap();
    store
      .transition_status(
        created.id,
        InvoiceStatus::Issued,
        created.version,
        BalanceGuard::None,
      )
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_invoice_number_collision_is_conflict() {
    let store = MemoryLedgerStore::new();
    let first = invoice_with_total();
    let mut second = invoice_with_total();
    second.invoice_number = first.invoice_number.clone();

    store.create(first, vec![]).await.unwrap();
    let err = store.create(second, vec![]).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvoiceNumberExists(_)));
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn test_append_rechecks_status_at_insert() {
    let store = MemoryLedgerStore::new();
    let invoice = issued(&store).await;

    // Entry built against an issued snapshot, applied after a cancel
    let entry = payment(&invoice, dec!(10.00));
    let cancelled = store
      .transition_status(
        invoice.id,
        InvoiceStatus::Cancelled,
        invoice.version,
        BalanceGuard::RequireNoNetPayments,
      )
      .await
      .unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

    let err = store.append(entry).await.unwrap_err();
    assert!(matches!(err, LedgerError::LedgerEntryOnCancelled));
  }

  #[tokio::test]
  async fn test_cancel_guard_sees_payment_despite_matching_version() {
    let store = MemoryLedgerStore::new();
    let invoice = issued(&store).await;

    // Payment lands after the cancelling writer took its snapshot. The
    // version still matches - appends never bump it - so only the balance
    // guard can reject the write.
    store.append(payment(&invoice, dec!(10.00))).await.unwrap();

    let err = store
      .transition_status(
        invoice.id,
        InvoiceStatus::Cancelled,
        invoice.version,
        BalanceGuard::RequireNoNetPayments,
      )
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      LedgerError::CannotCancelWithPayments { paid } if paid == dec!(10.00)
    ));
  }

  #[tokio::test]
  async fn test_append_rechecks_outstanding() {
    let store = MemoryLedgerStore::new();
    let invoice = issued(&store).await;

    // Two 100.00 entries both built against the empty ledger; total is 115.00
    let first = payment(&invoice, dec!(100.00));
    let second = payment(&invoice, dec!(100.00));

    store.append(first).await.unwrap();
    let err = store.append(second).await.unwrap_err();
    assert!(matches!(
      err,
      LedgerError::ExceedsOutstanding { outstanding, .. } if outstanding == dec!(15.00)
    ));
  }

  #[tokio::test]
  async fn test_append_rechecks_duplicate_reference_and_reversal() {
    let store = MemoryLedgerStore::new();
    let invoice = issued(&store).await;
    let reference = crate::domain::invoice::PaymentReference::new("TXN-9".to_string()).unwrap();

    let mut first = payment(&invoice, dec!(10.00));
    first.reference = Some(reference.clone());
    let mut second = payment(&invoice, dec!(10.00));
    second.reference = Some(reference);

    let first = store.append(first).await.unwrap();
    let err = store.append(second).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateReference(_)));

    let method = PaymentMethod::new("EFT".to_string()).unwrap();
    let reversal = Payment::reversal_of(&first, method.clone(), None, None, Uuid::new_v4());
    store.append(reversal).await.unwrap();

    let again = Payment::reversal_of(&first, method, None, None, Uuid::new_v4());
    let err = store.append(again).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyReversed(id) if id == first.id));
  }

  #[tokio::test]
  async fn test_transition_requires_matching_version() {
    let store = MemoryLedgerStore::new();
    let invoice = invoice_with_total();
    let created = store.create(invoice, vec![]).await.unwrap();

    let updated = store
      .transition_status(
        created.id,
        InvoiceStatus::Issued,
        created.version,
        BalanceGuard::None,
      )
      .await
      .unwrap();
    assert_eq!(updated.version, created.version.next());

    let err = store
      .transition_status(
        created.id,
        InvoiceStatus::Cancelled,
        created.version,
        BalanceGuard::None,
      )
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::VersionConflict));
  }

  #[tokio::test]
  async fn test_missing_invoice_is_not_found() {
    let store = MemoryLedgerStore::new();
    let orphan = payment(&invoice_with_total(), dec!(10.00));

    let err = store.append(orphan).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvoiceNotFound(_)));

    let err = store
      .transition_status(
        Uuid::new_v4(),
        InvoiceStatus::Issued,
        Version::initial(),
        BalanceGuard::None,
      )
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::InvoiceNotFound(_)));
  }
}
