use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{InvoiceLifecycleService, LedgerError};

#[derive(Debug, Deserialize)]
pub struct CancelInvoiceCommand {
  pub user_id: Uuid,
  pub invoice_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CancelInvoiceResponse {
  pub invoice_id: Uuid,
  pub invoice_number: String,
  pub status: String,
}

pub struct CancelInvoiceUseCase {
  lifecycle: Arc<InvoiceLifecycleService>,
}

impl CancelInvoiceUseCase {
  pub fn new(lifecycle: Arc<InvoiceLifecycleService>) -> Self {
    Self { lifecycle }
  }

  pub async fn execute(
    &self,
    command: CancelInvoiceCommand,
  ) -> Result<CancelInvoiceResponse, LedgerError> {
    let invoice = self
      .lifecycle
      .cancel_invoice(command.user_id, command.invoice_id)
      .await?;

    Ok(CancelInvoiceResponse {
      invoice_id: invoice.id,
      invoice_number: invoice.invoice_number.into_inner(),
      status: invoice.status.as_str().to_string(),
    })
  }
}
