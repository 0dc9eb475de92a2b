use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{
  Description, InvoiceDraft, InvoiceLifecycleService, LedgerError, LineInput, Money, Quantity,
  VatRate,
};

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceItemDto {
  pub description: String,
  pub qty: i32,
  pub unit_price: Decimal,
  pub vat_rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceCommand {
  pub user_id: Uuid,
  pub customer_id: Uuid,
  pub issue_date: NaiveDate,
  pub due_date: NaiveDate,
  pub items: Vec<CreateInvoiceItemDto>,
}

#[derive(Debug, Serialize)]
pub struct CreateInvoiceResponse {
  pub invoice_id: Uuid,
  pub invoice_number: String,
  pub status: String,
  pub subtotal: Decimal,
  pub vat_total: Decimal,
  pub total: Decimal,
  pub issue_date: NaiveDate,
  pub due_date: NaiveDate,
  pub created_at: DateTime<Utc>,
}

pub struct CreateInvoiceUseCase {
  lifecycle: Arc<InvoiceLifecycleService>,
}

impl CreateInvoiceUseCase {
  pub fn new(lifecycle: Arc<InvoiceLifecycleService>) -> Self {
    Self { lifecycle }
  }

  pub async fn execute(
    &self,
    command: CreateInvoiceCommand,
  ) -> Result<CreateInvoiceResponse, LedgerError> {
    let line_items: Vec<LineInput> = command
      .items
      .into_iter()
      .map(|item| {
        let description = Description::new(item.description)?;
        let qty = Quantity::new(item.qty)?;
        let unit_price = Money::new(item.unit_price)?;
        let vat_rate = VatRate::new(item.vat_rate)?;
        Ok((description, qty, unit_price, vat_rate))
      })
      .collect::<Result<Vec<_>, LedgerError>>()?;

    let draft = InvoiceDraft {
      customer_id: command.customer_id,
      issue_date: command.issue_date,
      due_date: command.due_date,
      line_items,
    };

    let (invoice, _items) = self.lifecycle.create_invoice(command.user_id, draft).await?;

    Ok(CreateInvoiceResponse {
      invoice_id: invoice.id,
      invoice_number: invoice.invoice_number.into_inner(),
      status: invoice.status.as_str().to_string(),
      subtotal: invoice.subtotal,
      vat_total: invoice.vat_total,
      total: invoice.total,
      issue_date: invoice.issue_date,
      due_date: invoice.due_date,
      created_at: invoice.created_at,
    })
  }
}
