use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{InvoiceLifecycleService, LedgerError};

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceCommand {
  pub user_id: Uuid,
  pub invoice_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct IssueInvoiceResponse {
  pub invoice_id: Uuid,
  pub invoice_number: String,
  pub status: String,
  pub total: Decimal,
  pub paid: Decimal,
  pub outstanding: Decimal,
}

pub struct IssueInvoiceUseCase {
  lifecycle: Arc<InvoiceLifecycleService>,
}

impl IssueInvoiceUseCase {
  pub fn new(lifecycle: Arc<InvoiceLifecycleService>) -> Self {
    Self { lifecycle }
  }

  pub async fn execute(
    &self,
    command: IssueInvoiceCommand,
  ) -> Result<IssueInvoiceResponse, LedgerError> {
    let (invoice, view) = self
      .lifecycle
      .issue_invoice(command.user_id, command.invoice_id)
      .await?;

    Ok(IssueInvoiceResponse {
      invoice_id: invoice.id,
      invoice_number: invoice.invoice_number.into_inner(),
      status: view.display_status.as_str().to_string(),
      total: invoice.total,
      paid: view.paid,
      outstanding: view.outstanding,
    })
  }
}
