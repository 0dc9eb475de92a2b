use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::audit::{AuditAction, AuditEvent, AuditRecorder, FieldChange};

use super::entities::{Customer, Invoice, InvoiceItem, InvoiceTotals, LineInput, Payment};
use super::errors::LedgerError;
use super::ports::{
  BalanceGuard, CustomerDirectory, InvoiceRepository, InvoiceWithLedger, PaymentRepository,
};
use super::projection::LedgerView;
use super::value_objects::{InvoiceNumber, InvoiceStatus, PaymentMethod, PaymentReference};

/// Invoice creation data, already validated into value objects.
pub struct InvoiceDraft {
  pub customer_id: Uuid,
  pub issue_date: NaiveDate,
  pub due_date: NaiveDate,
  pub line_items: Vec<LineInput>,
}

/// Owns the persisted status transitions: Draft on creation, Draft -> Issued,
/// and cancellation while the ledger balance is zero.
pub struct InvoiceLifecycleService {
  invoices: Arc<dyn InvoiceRepository>,
  customers: Arc<dyn CustomerDirectory>,
  audit: Arc<dyn AuditRecorder>,
}

impl InvoiceLifecycleService {
  pub fn new(
    invoices: Arc<dyn InvoiceRepository>,
    customers: Arc<dyn CustomerDirectory>,
    audit: Arc<dyn AuditRecorder>,
  ) -> Self {
    Self {
      invoices,
      customers,
      audit,
    }
  }

  pub async fn create_invoice(
    &self,
    user_id: Uuid,
    draft: InvoiceDraft,
  ) -> Result<(Invoice, Vec<InvoiceItem>), LedgerError> {
    if draft.line_items.is_empty() {
      return Err(LedgerError::NoItems);
    }

    // Customers are owned elsewhere; only existence matters here
    self
      .customers
      .find_customer(draft.customer_id)
      .await?
      .ok_or(LedgerError::CustomerNotFound(draft.customer_id))?;

    let totals = InvoiceTotals::calculate(&draft.line_items);
    let invoice_number = InvoiceNumber::generate(draft.issue_date);

    let invoice = Invoice::new(
      draft.customer_id,
      invoice_number,
      draft.issue_date,
      draft.due_date,
      totals,
      user_id,
    );

    let items: Vec<InvoiceItem> = draft
      .line_items
      .into_iter()
      .map(|(description, qty, unit_price, vat_rate)| {
        InvoiceItem::new(invoice.id, description, qty, unit_price, vat_rate)
      })
      .collect();

    let created = self.invoices.create(invoice, items.clone()).await?;

    tracing::info!(
      invoice_id = %created.id,
      invoice_number = %created.invoice_number,
      total = %created.total,
      "Invoice created"
    );

    emit(self.audit.as_ref(), invoice_created_event(&created, user_id)).await;
    for item in &items {
      emit(self.audit.as_ref(), item_created_event(item, user_id)).await;
    }

    Ok((created, items))
  }

  pub async fn issue_invoice(
    &self,
    user_id: Uuid,
    invoice_id: Uuid,
  ) -> Result<(Invoice, LedgerView), LedgerError> {
    let InvoiceWithLedger {
      invoice, payments, ..
    } = self
      .invoices
      .find_with_ledger(invoice_id)
      .await?
      .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

    if invoice.status != InvoiceStatus::Draft {
      return Err(LedgerError::NotDraft(invoice.status));
    }

    let updated = self
      .invoices
      .transition_status(
        invoice_id,
        InvoiceStatus::Issued,
        invoice.version,
        BalanceGuard::None,
      )
      .await?;

    // Recomputed from the ledger, not assumed to be zero
    let view = LedgerView::project(&updated, &payments);

    tracing::info!(invoice_id = %updated.id, "Invoice issued");
    emit(
      self.audit.as_ref(),
      status_changed_event(&updated, invoice.status, user_id),
    )
    .await;

    Ok((updated, view))
  }

  pub async fn cancel_invoice(
    &self,
    user_id: Uuid,
    invoice_id: Uuid,
  ) -> Result<Invoice, LedgerError> {
    let InvoiceWithLedger {
      invoice, payments, ..
    } = self
      .invoices
      .find_with_ledger(invoice_id)
      .await?
      .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

    let paid: Decimal = payments.iter().map(|entry| entry.amount).sum();
    if paid > Decimal::ZERO {
      return Err(LedgerError::CannotCancelWithPayments { paid });
    }

    // The balance guard is re-verified inside the store transaction: a payment
    // landing between this check and the write does not bump the version token
    let updated = self
      .invoices
      .transition_status(
        invoice_id,
        InvoiceStatus::Cancelled,
        invoice.version,
        BalanceGuard::RequireNoNetPayments,
      )
      .await?;

    tracing::info!(invoice_id = %updated.id, "Invoice cancelled");
    emit(
      self.audit.as_ref(),
      status_changed_event(&updated, invoice.status, user_id),
    )
    .await;

    Ok(updated)
  }
}

/// Applies payments, reversals, and refunds as signed ledger entries against
/// an issued invoice, and projects the derived view from the entry stream.
pub struct PaymentLedgerService {
  invoices: Arc<dyn InvoiceRepository>,
  payments: Arc<dyn PaymentRepository>,
  customers: Arc<dyn CustomerDirectory>,
  audit: Arc<dyn AuditRecorder>,
}

impl PaymentLedgerService {
  pub fn new(
    invoices: Arc<dyn InvoiceRepository>,
    payments: Arc<dyn PaymentRepository>,
    customers: Arc<dyn CustomerDirectory>,
    audit: Arc<dyn AuditRecorder>,
  ) -> Self {
    Self {
      invoices,
      payments,
      customers,
      audit,
    }
  }

  pub async fn apply_payment(
    &self,
    user_id: Uuid,
    invoice_id: Uuid,
    amount: Decimal,
    method: PaymentMethod,
    reference: Option<PaymentReference>,
  ) -> Result<(Payment, LedgerView), LedgerError> {
    if amount <= Decimal::ZERO {
      return Err(LedgerError::NonPositiveAmount);
    }

    let InvoiceWithLedger {
      invoice, payments, ..
    } = self
      .invoices
      .find_with_ledger(invoice_id)
      .await?
      .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

    ensure_accepts_entries(&invoice)?;

    let view = LedgerView::project(&invoice, &payments);
    if amount > view.outstanding {
      return Err(LedgerError::ExceedsOutstanding {
        amount,
        outstanding: view.outstanding,
      });
    }

    if let Some(reference) = &reference {
      if payments
        .iter()
        .any(|entry| entry.reference.as_ref() == Some(reference))
      {
        return Err(LedgerError::DuplicateReference(
          reference.value().to_string(),
        ));
      }
    }

    let entry = Payment::capture(invoice.id, amount, method, reference, user_id);
    let appended = self.payments.append(entry).await?;

    let mut entries = payments;
    entries.push(appended.clone());
    let view = LedgerView::project(&invoice, &entries);

    tracing::info!(
      invoice_id = %invoice.id,
      payment_id = %appended.id,
      amount = %appended.amount,
      "Payment captured"
    );
    emit(self.audit.as_ref(), entry_created_event(&appended, user_id)).await;

    Ok((appended, view))
  }

  pub async fn reverse_payment(
    &self,
    user_id: Uuid,
    invoice_id: Uuid,
    payment_id: Uuid,
    method: PaymentMethod,
    reference: Option<PaymentReference>,
    reason: Option<String>,
  ) -> Result<(Payment, LedgerView), LedgerError> {
    let InvoiceWithLedger {
      invoice, payments, ..
    } = self
      .invoices
      .find_with_ledger(invoice_id)
      .await?
      .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

    ensure_accepts_entries(&invoice)?;

    let original = payments
      .iter()
      .find(|entry| entry.id == payment_id)
      .cloned()
      .ok_or(LedgerError::PaymentNotFound {
        invoice_id,
        payment_id,
      })?;

    if original.amount <= Decimal::ZERO {
      return Err(LedgerError::NotAPayment(payment_id));
    }

    if payments
      .iter()
      .any(|entry| entry.reversed_payment_id == Some(original.id))
    {
      return Err(LedgerError::AlreadyReversed(original.id));
    }

    let paid_so_far: Decimal = payments.iter().map(|entry| entry.amount).sum();
    if paid_so_far <= Decimal::ZERO {
      return Err(LedgerError::NothingToReverse);
    }

    let reversal = Payment::reversal_of(&original, method, reference, reason, user_id);
    let appended = self.payments.append(reversal).await?;

    let mut entries = payments;
    entries.push(appended.clone());
    let view = LedgerView::project(&invoice, &entries);

    tracing::info!(
      invoice_id = %invoice.id,
      original_payment_id = %original.id,
      reversal_payment_id = %appended.id,
      "Payment reversed"
    );
    emit(self.audit.as_ref(), entry_created_event(&appended, user_id)).await;

    Ok((appended, view))
  }

  pub async fn refund(
    &self,
    user_id: Uuid,
    invoice_id: Uuid,
    amount: Decimal,
    method: PaymentMethod,
    reference: Option<PaymentReference>,
    reason: Option<String>,
  ) -> Result<(Payment, LedgerView), LedgerError> {
    if amount <= Decimal::ZERO {
      return Err(LedgerError::NonPositiveAmount);
    }

    let InvoiceWithLedger {
      invoice, payments, ..
    } = self
      .invoices
      .find_with_ledger(invoice_id)
      .await?
      .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

    ensure_accepts_entries(&invoice)?;

    let view = LedgerView::project(&invoice, &payments);
    if view.paid <= Decimal::ZERO {
      return Err(LedgerError::NothingToRefund);
    }
    if amount > view.paid {
      return Err(LedgerError::ExceedsPaid {
        amount,
        paid: view.paid,
      });
    }

    let refund = Payment::refund(invoice.id, amount, method, reference, reason, user_id);
    let appended = self.payments.append(refund).await?;

    let mut entries = payments;
    entries.push(appended.clone());
    let view = LedgerView::project(&invoice, &entries);

    tracing::info!(
      invoice_id = %invoice.id,
      refund_payment_id = %appended.id,
      amount = %appended.amount,
      "Refund captured"
    );
    emit(self.audit.as_ref(), entry_created_event(&appended, user_id)).await;

    Ok((appended, view))
  }

  /// Full read projection: invoice, customer, items, entries newest first,
  /// and the derived view recomputed from the live ledger.
  pub async fn get_invoice(
    &self,
    invoice_id: Uuid,
  ) -> Result<
    (
      Invoice,
      Option<Customer>,
      Vec<InvoiceItem>,
      Vec<Payment>,
      LedgerView,
    ),
    LedgerError,
  > {
    let InvoiceWithLedger {
      invoice,
      items,
      mut payments,
    } = self
      .invoices
      .find_with_ledger(invoice_id)
      .await?
      .ok_or(LedgerError::InvoiceNotFound(invoice_id))?;

    let customer = self.customers.find_customer(invoice.customer_id).await?;
    let view = LedgerView::project(&invoice, &payments);

    payments.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));

    Ok((invoice, customer, items, payments, view))
  }

  pub async fn list_invoices(&self) -> Result<Vec<(Invoice, LedgerView)>, LedgerError> {
    let rows = self.invoices.list_with_payments().await?;

    Ok(
      rows
        .into_iter()
        .map(|(invoice, payments)| {
          let view = LedgerView::project(&invoice, &payments);
          (invoice, view)
        })
        .collect(),
    )
  }
}

fn ensure_accepts_entries(invoice: &Invoice) -> Result<(), LedgerError> {
  match invoice.status {
    InvoiceStatus::Cancelled => Err(LedgerError::LedgerEntryOnCancelled),
    InvoiceStatus::Draft => Err(LedgerError::LedgerEntryOnDraft),
    InvoiceStatus::Issued => Ok(()),
  }
}

// Version-only writes produce no change entries and are never recorded
async fn emit(audit: &dyn AuditRecorder, event: AuditEvent) {
  if !event.is_empty() {
    audit.record(event).await;
  }
}

fn invoice_created_event(invoice: &Invoice, user_id: Uuid) -> AuditEvent {
  AuditEvent::new(
    "Invoice",
    invoice.id,
    AuditAction::Created,
    vec![
      FieldChange::set("customer_id", invoice.customer_id),
      FieldChange::set("invoice_number", invoice.invoice_number.value()),
      FieldChange::set("issue_date", invoice.issue_date),
      FieldChange::set("due_date", invoice.due_date),
      FieldChange::set("status", invoice.status.as_str()),
      FieldChange::set("subtotal", invoice.subtotal),
      FieldChange::set("vat_total", invoice.vat_total),
      FieldChange::set("total", invoice.total),
      FieldChange::set("created_by", invoice.created_by),
    ],
    user_id,
  )
}

fn item_created_event(item: &InvoiceItem, user_id: Uuid) -> AuditEvent {
  AuditEvent::new(
    "InvoiceItem",
    item.id,
    AuditAction::Created,
    vec![
      FieldChange::set("invoice_id", item.invoice_id),
      FieldChange::set("description", item.description.value()),
      FieldChange::set("qty", item.qty.value()),
      FieldChange::set("unit_price", item.unit_price.value()),
      FieldChange::set("vat_rate", item.vat_rate.value()),
      FieldChange::set("line_total", item.line_total),
      FieldChange::set("vat_amount", item.vat_amount),
    ],
    user_id,
  )
}

fn status_changed_event(invoice: &Invoice, previous: InvoiceStatus, user_id: Uuid) -> AuditEvent {
  AuditEvent::new(
    "Invoice",
    invoice.id,
    AuditAction::Updated,
    vec![FieldChange::changed(
      "status",
      previous.as_str(),
      invoice.status.as_str(),
    )],
    user_id,
  )
}

fn entry_created_event(entry: &Payment, user_id: Uuid) -> AuditEvent {
  AuditEvent::new(
    "Payment",
    entry.id,
    AuditAction::Created,
    vec![
      FieldChange::set("invoice_id", entry.invoice_id),
      FieldChange::set("amount", entry.amount),
      FieldChange::set("method", entry.method.value()),
      FieldChange::set("reference", entry.reference.as_ref().map(|r| r.value())),
      FieldChange::set("reason", entry.reason.clone()),
      FieldChange::set("reversed_payment_id", entry.reversed_payment_id),
      FieldChange::set("captured_by", entry.captured_by),
    ],
    user_id,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::invoice::errors::ErrorKind;
  use crate::domain::invoice::value_objects::{
    Description, DisplayStatus, Money, Quantity, VatRate, Version,
  };
  use crate::infrastructure::audit::MemoryAuditRecorder;
  use crate::infrastructure::persistence::memory::MemoryLedgerStore;
  use chrono::Utc;
  use rust_decimal_macros::dec;

  struct Harness {
    lifecycle: InvoiceLifecycleService,
    ledger: PaymentLedgerService,
    store: Arc<MemoryLedgerStore>,
    audit: Arc<MemoryAuditRecorder>,
    customer_id: Uuid,
    user_id: Uuid,
  }

  fn harness() -> Harness {
    let store = Arc::new(MemoryLedgerStore::new());
    let audit = Arc::new(MemoryAuditRecorder::new());

    let customer = Customer {
      id: Uuid::new_v4(),
      name: "Acme Ltd".to_string(),
      email: Some("billing@acme.test".to_string()),
      phone: None,
      address: None,
      created_at: Utc::now(),
    };
    let customer_id = customer.id;
    store.insert_customer(customer);

    let lifecycle = InvoiceLifecycleService::new(store.clone(), store.clone(), audit.clone());
    let ledger =
      PaymentLedgerService::new(store.clone(), store.clone(), store.clone(), audit.clone());

    Harness {
      lifecycle,
      ledger,
      store,
      audit,
      customer_id,
      user_id: Uuid::new_v4(),
    }
  }

  fn line(desc: &str, qty: i32, price: Decimal, rate: Decimal) -> LineInput {
    (
      Description::new(desc.to_string()).unwrap(),
      Quantity::new(qty).unwrap(),
      Money::new(price).unwrap(),
      VatRate::new(rate).unwrap(),
    )
  }

  fn standard_draft(customer_id: Uuid) -> InvoiceDraft {
    // subtotal 100.00, VAT 15.00, total 115.00
    InvoiceDraft {
      customer_id,
      issue_date: NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
      due_date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
      line_items: vec![line("Services", 1, dec!(100.00), dec!(0.15))],
    }
  }

  fn method() -> PaymentMethod {
    PaymentMethod::new("EFT".to_string()).unwrap()
  }

  fn reference(value: &str) -> Option<PaymentReference> {
    Some(PaymentReference::new(value.to_string()).unwrap())
  }

  async fn issued_invoice(h: &Harness) -> Invoice {
    let (invoice, _) = h
      .lifecycle
      .create_invoice(h.user_id, standard_draft(h.customer_id))
      .await
      .unwrap();
    let (issued, _) = h.lifecycle.issue_invoice(h.user_id, invoice.id).await.unwrap();
    issued
  }

  #[tokio::test]
  async fn test_create_invoice_computes_totals() {
    let h = harness();
    let (invoice, items) = h
      .lifecycle
      .create_invoice(h.user_id, standard_draft(h.customer_id))
      .await
      .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.subtotal, dec!(100.00));
    assert_eq!(invoice.vat_total, dec!(15.00));
    assert_eq!(invoice.total, dec!(115.00));
    assert_eq!(invoice.total, invoice.subtotal + invoice.vat_total);
    assert_eq!(items.len(), 1);
    assert!(invoice.invoice_number.value().starts_with("INV-20260215-"));
  }

  #[tokio::test]
  async fn test_create_invoice_unknown_customer() {
    let h = harness();
    let missing = Uuid::new_v4();
    let err = h
      .lifecycle
      .create_invoice(h.user_id, standard_draft(missing))
      .await
      .unwrap_err();

    assert!(matches!(err, LedgerError::CustomerNotFound(id) if id == missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);
  }

  #[tokio::test]
  async fn test_create_invoice_requires_items() {
    let h = harness();
    let draft = InvoiceDraft {
      line_items: vec![],
      ..standard_draft(h.customer_id)
    };
    let err = h.lifecycle.create_invoice(h.user_id, draft).await.unwrap_err();
    assert!(matches!(err, LedgerError::NoItems));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
  }

  #[tokio::test]
  async fn test_issue_only_from_draft() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    let err = h
      .lifecycle
      .issue_invoice(h.user_id, invoice.id)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::NotDraft(InvoiceStatus::Issued)));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
  }

  #[tokio::test]
  async fn test_issue_cancelled_invoice_fails() {
    let h = harness();
    let (invoice, _) = h
      .lifecycle
      .create_invoice(h.user_id, standard_draft(h.customer_id))
      .await
      .unwrap();
    h.lifecycle.cancel_invoice(h.user_id, invoice.id).await.unwrap();

    let err = h
      .lifecycle
      .issue_invoice(h.user_id, invoice.id)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::NotDraft(InvoiceStatus::Cancelled)));
  }

  #[tokio::test]
  async fn test_issue_recomputes_view_from_ledger() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    let stored = h.store.find_by_id(invoice.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvoiceStatus::Issued);
    assert!(stored.version.value() > Version::initial().value());

    let (_, _, _, _, view) = h.ledger.get_invoice(invoice.id).await.unwrap();
    assert_eq!(view.paid, dec!(0));
    assert_eq!(view.outstanding, dec!(115.00));
    assert_eq!(view.display_status, DisplayStatus::Issued);
  }

  #[tokio::test]
  async fn test_payment_scenario_partial_then_full() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    let (_, view) = h
      .ledger
      .apply_payment(h.user_id, invoice.id, dec!(50.00), method(), None)
      .await
      .unwrap();
    assert_eq!(view.paid, dec!(50.00));
    assert_eq!(view.outstanding, dec!(65.00));
    assert_eq!(view.display_status, DisplayStatus::PartiallyPaid);

    let (_, view) = h
      .ledger
      .apply_payment(h.user_id, invoice.id, dec!(65.00), method(), None)
      .await
      .unwrap();
    assert_eq!(view.paid, dec!(115.00));
    assert_eq!(view.outstanding, dec!(0.00));
    assert_eq!(view.display_status, DisplayStatus::Paid);

    let err = h
      .ledger
      .apply_payment(h.user_id, invoice.id, dec!(0.01), method(), None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::ExceedsOutstanding { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
  }

  #[tokio::test]
  async fn test_payment_rejects_non_positive_amount() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    for amount in [dec!(0), dec!(-5)] {
      let err = h
        .ledger
        .apply_payment(h.user_id, invoice.id, amount, method(), None)
        .await
        .unwrap_err();
      assert!(matches!(err, LedgerError::NonPositiveAmount));
    }
  }

  #[tokio::test]
  async fn test_payment_requires_issued_invoice() {
    let h = harness();
    let (draft, _) = h
      .lifecycle
      .create_invoice(h.user_id, standard_draft(h.customer_id))
      .await
      .unwrap();

    let err = h
      .ledger
      .apply_payment(h.user_id, draft.id, dec!(10.00), method(), None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::LedgerEntryOnDraft));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    h.lifecycle.cancel_invoice(h.user_id, draft.id).await.unwrap();
    let err = h
      .ledger
      .apply_payment(h.user_id, draft.id, dec!(10.00), method(), None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::LedgerEntryOnCancelled));
  }

  #[tokio::test]
  async fn test_duplicate_reference_conflicts() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(10.00), method(), reference("TXN-1"))
      .await
      .unwrap();

    let err = h
      .ledger
      .apply_payment(h.user_id, invoice.id, dec!(10.00), method(), reference("TXN-1"))
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateReference(ref r) if r == "TXN-1"));
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn test_absent_references_never_collide() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(10.00), method(), None)
      .await
      .unwrap();
    h.ledger
      .apply_payment(
        h.user_id,
        invoice.id,
        dec!(10.00),
        method(),
        PaymentReference::from_input(Some("   ".to_string())).unwrap(),
      )
      .await
      .unwrap();

    let (_, _, _, payments, view) = h.ledger.get_invoice(invoice.id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(view.paid, dec!(20.00));
  }

  #[tokio::test]
  async fn test_reversal_negates_and_blocks_double_reversal() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    let (payment, _) = h
      .ledger
      .apply_payment(h.user_id, invoice.id, dec!(40.00), method(), None)
      .await
      .unwrap();

    let (reversal, view) = h
      .ledger
      .reverse_payment(
        h.user_id,
        invoice.id,
        payment.id,
        method(),
        None,
        Some("captured twice".to_string()),
      )
      .await
      .unwrap();

    assert_eq!(reversal.amount, dec!(-40.00));
    assert_eq!(reversal.reversed_payment_id, Some(payment.id));
    assert_eq!(view.paid, dec!(0.00));
    assert_eq!(view.outstanding, dec!(115.00));
    assert_eq!(view.display_status, DisplayStatus::Issued);

    let err = h
      .ledger
      .reverse_payment(h.user_id, invoice.id, payment.id, method(), None, None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyReversed(id) if id == payment.id));
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn test_reversal_rejects_negative_entries_and_unknown_targets() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(40.00), method(), None)
      .await
      .unwrap();
    let (refund, _) = h
      .ledger
      .refund(h.user_id, invoice.id, dec!(10.00), method(), None, None)
      .await
      .unwrap();

    let err = h
      .ledger
      .reverse_payment(h.user_id, invoice.id, refund.id, method(), None, None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::NotAPayment(id) if id == refund.id));

    let missing = Uuid::new_v4();
    let err = h
      .ledger
      .reverse_payment(h.user_id, invoice.id, missing, method(), None, None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::PaymentNotFound { payment_id, .. } if payment_id == missing));
  }

  #[tokio::test]
  async fn test_refund_scenario_back_to_issued() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(40.00), method(), None)
      .await
      .unwrap();

    let (_, view) = h
      .ledger
      .refund(
        h.user_id,
        invoice.id,
        dec!(40.00),
        method(),
        None,
        Some("order cancelled".to_string()),
      )
      .await
      .unwrap();

    assert_eq!(view.paid, dec!(0.00));
    assert_eq!(view.outstanding, invoice.total);
    assert_eq!(view.display_status, DisplayStatus::Issued);
  }

  #[tokio::test]
  async fn test_refund_limits() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    let err = h
      .ledger
      .refund(h.user_id, invoice.id, dec!(5.00), method(), None, None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::NothingToRefund));

    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(40.00), method(), None)
      .await
      .unwrap();

    let err = h
      .ledger
      .refund(h.user_id, invoice.id, dec!(40.01), method(), None, None)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::ExceedsPaid { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
  }

  #[tokio::test]
  async fn test_cancel_blocked_by_payments_until_refunded() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(40.00), method(), None)
      .await
      .unwrap();

    let err = h
      .lifecycle
      .cancel_invoice(h.user_id, invoice.id)
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::CannotCancelWithPayments { paid } if paid == dec!(40.00)));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    h.ledger
      .refund(h.user_id, invoice.id, dec!(40.00), method(), None, None)
      .await
      .unwrap();

    let cancelled = h
      .lifecycle
      .cancel_invoice(h.user_id, invoice.id)
      .await
      .unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
  }

  #[tokio::test]
  async fn test_paid_is_ledger_fold_and_reads_are_idempotent() {
    let h = harness();
    let invoice = issued_invoice(&h).await;

    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(30.00), method(), None)
      .await
      .unwrap();
    h.ledger
      .refund(h.user_id, invoice.id, dec!(10.00), method(), None, None)
      .await
      .unwrap();
    h.ledger
      .apply_payment(h.user_id, invoice.id, dec!(5.00), method(), None)
      .await
      .unwrap();

    let (_, _, _, payments, first) = h.ledger.get_invoice(invoice.id).await.unwrap();
    let expected: Decimal = payments.iter().map(|entry| entry.amount).sum();
    assert_eq!(first.paid, expected);
    assert_eq!(first.paid, dec!(25.00));
    assert_eq!(first.outstanding, invoice.total - first.paid);
    assert!(
      payments
        .windows(2)
        .all(|pair| pair[0].captured_at >= pair[1].captured_at),
      "entries are returned newest first"
    );

    let (_, _, _, _, second) = h.ledger.get_invoice(invoice.id).await.unwrap();
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_two_writers_from_one_snapshot_conflict() {
    let h = harness();
    let (invoice, _) = h
      .lifecycle
      .create_invoice(h.user_id, standard_draft(h.customer_id))
      .await
      .unwrap();

    // Both writers hold the same snapshot version; the slower one must lose
    let snapshot_version = invoice.version;

    h.store
      .transition_status(
        invoice.id,
        InvoiceStatus::Issued,
        snapshot_version,
        BalanceGuard::None,
      )
      .await
      .unwrap();

    let err = h
      .store
      .transition_status(
        invoice.id,
        InvoiceStatus::Issued,
        snapshot_version,
        BalanceGuard::None,
      )
      .await
      .unwrap_err();
    assert!(matches!(err, LedgerError::VersionConflict));
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn test_list_invoices_projects_each_ledger() {
    let h = harness();
    let first = issued_invoice(&h).await;
    let second = issued_invoice(&h).await;

    h.ledger
      .apply_payment(h.user_id, first.id, dec!(115.00), method(), None)
      .await
      .unwrap();

    let listed = h.ledger.list_invoices().await.unwrap();
    assert_eq!(listed.len(), 2);

    let view_of = |id: Uuid| {
      listed
        .iter()
        .find(|(invoice, _)| invoice.id == id)
        .map(|(_, view)| *view)
        .unwrap()
    };
    assert_eq!(view_of(first.id).display_status, DisplayStatus::Paid);
    assert_eq!(view_of(second.id).display_status, DisplayStatus::Issued);
  }

  #[tokio::test]
  async fn test_status_change_audit_has_only_status_field() {
    let h = harness();
    let (invoice, _) = h
      .lifecycle
      .create_invoice(h.user_id, standard_draft(h.customer_id))
      .await
      .unwrap();
    h.audit.take();

    h.lifecycle.issue_invoice(h.user_id, invoice.id).await.unwrap();

    let events = h.audit.take();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.entity_type, "Invoice");
    assert_eq!(event.action, AuditAction::Updated);
    assert_eq!(event.changes.len(), 1);
    assert_eq!(event.changes[0].field, "status");
    assert_eq!(event.changes[0].old, Some(serde_json::json!("draft")));
    assert_eq!(event.changes[0].new, Some(serde_json::json!("issued")));
    assert_eq!(event.performed_by, Some(h.user_id));
  }

  #[tokio::test]
  async fn test_create_audit_never_mentions_version() {
    let h = harness();
    h.lifecycle
      .create_invoice(h.user_id, standard_draft(h.customer_id))
      .await
      .unwrap();

    let events = h.audit.take();
    // One event for the invoice, one per line item
    assert_eq!(events.len(), 2);
    for event in &events {
      assert_eq!(event.action, AuditAction::Created);
      assert!(event.changes.iter().all(|change| change.field != "version"));
    }
  }
}
