use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{LedgerError, PaymentLedgerService, PaymentMethod, PaymentReference};

#[derive(Debug, Deserialize)]
pub struct ApplyPaymentCommand {
  pub user_id: Uuid,
  pub invoice_id: Uuid,
  pub amount: Decimal,
  pub method: String,
  pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplyPaymentResponse {
  pub invoice_id: Uuid,
  pub payment_id: Uuid,
  pub status: String,
  pub total: Decimal,
  pub paid: Decimal,
  pub outstanding: Decimal,
}

pub struct ApplyPaymentUseCase {
  ledger: Arc<PaymentLedgerService>,
}

impl ApplyPaymentUseCase {
  pub fn new(ledger: Arc<PaymentLedgerService>) -> Self {
    Self { ledger }
  }

  pub async fn execute(
    &self,
    command: ApplyPaymentCommand,
  ) -> Result<ApplyPaymentResponse, LedgerError> {
    let method = PaymentMethod::new(command.method)?;
    let reference = PaymentReference::from_input(command.reference)?;

    let (payment, view) = self
      .ledger
      .apply_payment(
        command.user_id,
        command.invoice_id,
        command.amount,
        method,
        reference,
      )
      .await?;

    Ok(ApplyPaymentResponse {
      invoice_id: command.invoice_id,
      payment_id: payment.id,
      status: view.display_status.as_str().to_string(),
      total: view.paid + view.outstanding,
      paid: view.paid,
      outstanding: view.outstanding,
    })
  }
}
