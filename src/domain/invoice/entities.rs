use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{
  Description, InvoiceNumber, InvoiceStatus, Money, PaymentMethod, PaymentReference, Quantity,
  VatRate, Version,
};

// Customer - reference data owned by an external registry; never mutated here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
  pub id: Uuid,
  pub name: String,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub address: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// One line of a draft invoice before totals are computed.
pub type LineInput = (Description, Quantity, Money, VatRate);

// Invoice Totals - computed once at creation, immutable afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
  pub subtotal: Decimal,
  pub vat_total: Decimal,
  pub total: Decimal,
}

impl InvoiceTotals {
  /// Pure line calculator: line total = qty x unit price, VAT = line total x rate.
  pub fn calculate(lines: &[LineInput]) -> Self {
    let mut subtotal = Decimal::ZERO;
    let mut vat_total = Decimal::ZERO;

    for (_, qty, unit_price, vat_rate) in lines {
      let line_total = qty.as_decimal() * unit_price.value();
      subtotal += line_total;
      vat_total += line_total * vat_rate.value();
    }

    Self {
      subtotal,
      vat_total,
      total: subtotal + vat_total,
    }
  }
}

// Invoice - root of the payment ledger stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
  pub id: Uuid,
  pub customer_id: Uuid,
  pub invoice_number: InvoiceNumber,
  pub issue_date: NaiveDate,
  pub due_date: NaiveDate,
  pub status: InvoiceStatus,
  pub subtotal: Decimal,
  pub vat_total: Decimal,
  pub total: Decimal,
  pub created_by: Uuid,
  pub created_at: DateTime<Utc>,
  pub version: Version,
}

impl Invoice {
  pub fn new(
    customer_id: Uuid,
    invoice_number: InvoiceNumber,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    totals: InvoiceTotals,
    created_by: Uuid,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      customer_id,
      invoice_number,
      issue_date,
      due_date,
      status: InvoiceStatus::Draft,
      subtotal: totals.subtotal,
      vat_total: totals.vat_total,
      total: totals.total,
      created_by,
      created_at: Utc::now(),
      version: Version::initial(),
    }
  }

  pub fn is_overdue(&self, current_date: NaiveDate) -> bool {
    self.status == InvoiceStatus::Issued && self.due_date < current_date
  }
}

// Invoice Item - created with its invoice, never edited afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
  pub id: Uuid,
  pub invoice_id: Uuid,
  pub description: Description,
  pub qty: Quantity,
  pub unit_price: Money,
  pub vat_rate: VatRate,
  pub line_total: Decimal,
  pub vat_amount: Decimal,
}

impl InvoiceItem {
  pub fn new(
    invoice_id: Uuid,
    description: Description,
    qty: Quantity,
    unit_price: Money,
    vat_rate: VatRate,
  ) -> Self {
    let line_total = qty.as_decimal() * unit_price.value();
    let vat_amount = line_total * vat_rate.value();

    Self {
      id: Uuid::new_v4(),
      invoice_id,
      description,
      qty,
      unit_price,
      vat_rate,
      line_total,
      vat_amount,
    }
  }
}

// Payment - one immutable signed ledger entry against an invoice.
// Positive amount = payment, negative = refund or reversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
  pub id: Uuid,
  pub invoice_id: Uuid,
  pub amount: Decimal,
  pub method: PaymentMethod,
  pub reference: Option<PaymentReference>,
  pub reason: Option<String>,
  pub reversed_payment_id: Option<Uuid>,
  pub captured_by: Uuid,
  pub captured_at: DateTime<Utc>,
}

impl Payment {
  pub fn capture(
    invoice_id: Uuid,
    amount: Decimal,
    method: PaymentMethod,
    reference: Option<PaymentReference>,
    captured_by: Uuid,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      invoice_id,
      amount,
      method,
      reference,
      reason: None,
      reversed_payment_id: None,
      captured_by,
      captured_at: Utc::now(),
    }
  }

  /// Exact negation of one prior payment, back-linked to it.
  pub fn reversal_of(
    original: &Payment,
    method: PaymentMethod,
    reference: Option<PaymentReference>,
    reason: Option<String>,
    captured_by: Uuid,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      invoice_id: original.invoice_id,
      amount: -original.amount,
      method,
      reference,
      reason,
      reversed_payment_id: Some(original.id),
      captured_by,
      captured_at: Utc::now(),
    }
  }

  /// Bulk reduction of the paid amount, not tied to one original payment.
  pub fn refund(
    invoice_id: Uuid,
    amount: Decimal,
    method: PaymentMethod,
    reference: Option<PaymentReference>,
    reason: Option<String>,
    captured_by: Uuid,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      invoice_id,
      amount: -amount,
      method,
      reference,
      reason,
      reversed_payment_id: None,
      captured_by,
      captured_at: Utc::now(),
    }
  }

  pub fn is_refund(&self) -> bool {
    self.amount < Decimal::ZERO
  }

  pub fn is_reversal(&self) -> bool {
    self.reversed_payment_id.is_some()
  }
}
