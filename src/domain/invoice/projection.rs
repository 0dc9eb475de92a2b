use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entities::{Invoice, Payment};
use super::value_objects::{DisplayStatus, InvoiceStatus};

/// Derived payment state of one invoice. Never persisted; recomputed from the
/// ledger entries on every read and write path so the stored truth and the
/// displayed truth cannot diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerView {
  pub paid: Decimal,
  pub outstanding: Decimal,
  pub display_status: DisplayStatus,
}

impl LedgerView {
  /// Pure fold over the entries: paid = sum of signed amounts,
  /// outstanding = total - paid.
  pub fn project(invoice: &Invoice, entries: &[Payment]) -> Self {
    let paid: Decimal = entries.iter().map(|entry| entry.amount).sum();
    let outstanding = invoice.total - paid;

    let display_status = match invoice.status {
      InvoiceStatus::Cancelled => DisplayStatus::Cancelled,
      InvoiceStatus::Draft => DisplayStatus::Draft,
      InvoiceStatus::Issued => {
        if outstanding <= Decimal::ZERO {
          DisplayStatus::Paid
        } else if paid > Decimal::ZERO {
          DisplayStatus::PartiallyPaid
        } else {
          DisplayStatus::Issued
        }
      }
    };

    Self {
      paid,
      outstanding,
      display_status,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::invoice::entities::{InvoiceTotals, LineInput};
  use crate::domain::invoice::value_objects::{
    Description, InvoiceNumber, Money, PaymentMethod, Quantity, VatRate,
  };
  use chrono::NaiveDate;
  use rust_decimal_macros::dec;
  use uuid::Uuid;

  fn issued_invoice(total_line: Decimal) -> Invoice {
    let lines: Vec<LineInput> = vec![(
      Description::new("Services".to_string()).unwrap(),
      Quantity::new(1).unwrap(),
      Money::new(total_line).unwrap(),
      VatRate::new(dec!(0)).unwrap(),
    )];
    let mut invoice = Invoice::new(
      Uuid::new_v4(),
      InvoiceNumber::new("INV-20260215-ABCDEF".to_string()).unwrap(),
      NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
      NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
      InvoiceTotals::calculate(&lines),
      Uuid::new_v4(),
    );
    invoice.status = InvoiceStatus::Issued;
    invoice
  }

  fn entry(invoice: &Invoice, amount: Decimal) -> Payment {
    Payment::capture(
      invoice.id,
      amount,
      PaymentMethod::new("EFT".to_string()).unwrap(),
      None,
      Uuid::new_v4(),
    )
  }

  #[test]
  fn test_no_entries_is_issued() {
    let invoice = issued_invoice(dec!(100));
    let view = LedgerView::project(&invoice, &[]);
    assert_eq!(view.paid, dec!(0));
    assert_eq!(view.outstanding, dec!(100));
    assert_eq!(view.display_status, DisplayStatus::Issued);
  }

  #[test]
  fn test_partial_then_full_payment() {
    let invoice = issued_invoice(dec!(100));
    let first = entry(&invoice, dec!(40));

    let view = LedgerView::project(&invoice, std::slice::from_ref(&first));
    assert_eq!(view.paid, dec!(40));
    assert_eq!(view.outstanding, dec!(60));
    assert_eq!(view.display_status, DisplayStatus::PartiallyPaid);

    let second = entry(&invoice, dec!(60));
    let view = LedgerView::project(&invoice, &[first, second]);
    assert_eq!(view.paid, dec!(100));
    assert_eq!(view.outstanding, dec!(0));
    assert_eq!(view.display_status, DisplayStatus::Paid);
  }

  #[test]
  fn test_refund_returns_to_issued_not_draft() {
    let invoice = issued_invoice(dec!(100));
    let payment = entry(&invoice, dec!(40));
    let refund = entry(&invoice, dec!(-40));

    let view = LedgerView::project(&invoice, &[payment, refund]);
    assert_eq!(view.paid, dec!(0));
    assert_eq!(view.outstanding, dec!(100));
    assert_eq!(view.display_status, DisplayStatus::Issued);
  }

  #[test]
  fn test_base_status_wins_for_draft_and_cancelled() {
    let mut invoice = issued_invoice(dec!(100));

    invoice.status = InvoiceStatus::Draft;
    let view = LedgerView::project(&invoice, &[]);
    assert_eq!(view.display_status, DisplayStatus::Draft);

    invoice.status = InvoiceStatus::Cancelled;
    let view = LedgerView::project(&invoice, &[]);
    assert_eq!(view.display_status, DisplayStatus::Cancelled);
  }

  #[test]
  fn test_projection_is_idempotent() {
    let invoice = issued_invoice(dec!(100));
    let entries = vec![entry(&invoice, dec!(30)), entry(&invoice, dec!(-10))];

    let first = LedgerView::project(&invoice, &entries);
    let second = LedgerView::project(&invoice, &entries);
    assert_eq!(first, second);
    assert_eq!(first.paid, dec!(20));
    assert_eq!(first.outstanding, dec!(80));
  }
}
