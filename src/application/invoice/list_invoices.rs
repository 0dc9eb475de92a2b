use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{LedgerError, PaymentLedgerService};

#[derive(Debug, Serialize)]
pub struct InvoiceListItemDto {
  pub invoice_id: Uuid,
  pub invoice_number: String,
  pub customer_id: Uuid,
  pub status: String,
  pub total: Decimal,
  pub paid: Decimal,
  pub outstanding: Decimal,
  pub issue_date: NaiveDate,
  pub due_date: NaiveDate,
  pub overdue: bool,
}

#[derive(Debug, Serialize)]
pub struct ListInvoicesResponse {
  pub invoices: Vec<InvoiceListItemDto>,
}

pub struct ListInvoicesUseCase {
  ledger: Arc<PaymentLedgerService>,
}

impl ListInvoicesUseCase {
  pub fn new(ledger: Arc<PaymentLedgerService>) -> Self {
    Self { ledger }
  }

  pub async fn execute(&self) -> Result<ListInvoicesResponse, LedgerError> {
    let rows = self.ledger.list_invoices().await?;
    let today = Utc::now().date_naive();

    let invoices = rows
      .into_iter()
      .map(|(invoice, view)| InvoiceListItemDto {
        invoice_id: invoice.id,
        invoice_number: invoice.invoice_number.value().to_string(),
        customer_id: invoice.customer_id,
        status: view.display_status.as_str().to_string(),
        total: invoice.total,
        paid: view.paid,
        outstanding: view.outstanding,
        issue_date: invoice.issue_date,
        due_date: invoice.due_date,
        overdue: invoice.is_overdue(today) && view.outstanding > Decimal::ZERO,
      })
      .collect();

    Ok(ListInvoicesResponse { invoices })
  }
}
