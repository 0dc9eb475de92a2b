use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{LedgerError, PaymentLedgerService};

#[derive(Debug, Deserialize)]
pub struct GetInvoiceCommand {
  pub invoice_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CustomerSummaryDto {
  pub id: Uuid,
  pub name: String,
  pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceItemDto {
  pub id: Uuid,
  pub description: String,
  pub qty: i32,
  pub unit_price: Decimal,
  pub vat_rate: Decimal,
  pub line_total: Decimal,
  pub vat_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PaymentEntryDto {
  pub id: Uuid,
  pub amount: Decimal,
  pub method: String,
  pub reference: Option<String>,
  pub reason: Option<String>,
  pub reversed_payment_id: Option<Uuid>,
  pub captured_by: Uuid,
  pub captured_at: DateTime<Utc>,
  pub is_refund: bool,
}

#[derive(Debug, Serialize)]
pub struct GetInvoiceResponse {
  pub invoice_id: Uuid,
  pub invoice_number: String,
  pub status: String,
  pub issue_date: NaiveDate,
  pub due_date: NaiveDate,
  pub overdue: bool,
  pub subtotal: Decimal,
  pub vat_total: Decimal,
  pub total: Decimal,
  pub paid: Decimal,
  pub outstanding: Decimal,
  pub customer: Option<CustomerSummaryDto>,
  pub items: Vec<InvoiceItemDto>,
  pub payments: Vec<PaymentEntryDto>,
}

pub struct GetInvoiceUseCase {
  ledger: Arc<PaymentLedgerService>,
}

impl GetInvoiceUseCase {
  pub fn new(ledger: Arc<PaymentLedgerService>) -> Self {
    Self { ledger }
  }

  pub async fn execute(
    &self,
    command: GetInvoiceCommand,
  ) -> Result<GetInvoiceResponse, LedgerError> {
    let (invoice, customer, items, payments, view) =
      self.ledger.get_invoice(command.invoice_id).await?;

    let today = Utc::now().date_naive();
    let overdue = invoice.is_overdue(today) && view.outstanding > Decimal::ZERO;

    Ok(GetInvoiceResponse {
      invoice_id: invoice.id,
      invoice_number: invoice.invoice_number.into_inner(),
      status: view.display_status.as_str().to_string(),
      issue_date: invoice.issue_date,
      due_date: invoice.due_date,
      overdue,
      subtotal: invoice.subtotal,
      vat_total: invoice.vat_total,
      total: invoice.total,
      paid: view.paid,
      outstanding: view.outstanding,
      customer: customer.map(|c| CustomerSummaryDto {
        id: c.id,
        name: c.name,
        email: c.email,
      }),
      items: items
        .into_iter()
        .map(|item| InvoiceItemDto {
          id: item.id,
          description: item.description.value().to_string(),
          qty: item.qty.value(),
          unit_price: item.unit_price.value(),
          vat_rate: item.vat_rate.value(),
          line_total: item.line_total,
          vat_amount: item.vat_amount,
        })
        .collect(),
      payments: payments
        .into_iter()
        .map(|entry| PaymentEntryDto {
          id: entry.id,
          amount: entry.amount,
          method: entry.method.value().to_string(),
          reference: entry.reference.as_ref().map(|r| r.value().to_string()),
          reason: entry.reason.clone(),
          reversed_payment_id: entry.reversed_payment_id,
          captured_by: entry.captured_by,
          captured_at: entry.captured_at,
          is_refund: entry.is_refund(),
        })
        .collect(),
    })
  }
}
