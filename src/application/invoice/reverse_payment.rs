use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{LedgerError, PaymentLedgerService, PaymentMethod, PaymentReference};

#[derive(Debug, Deserialize)]
pub struct ReversePaymentCommand {
  pub user_id: Uuid,
  pub invoice_id: Uuid,
  pub payment_id: Uuid,
  pub method: String,
  pub reference: Option<String>,
  pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReversePaymentResponse {
  pub invoice_id: Uuid,
  pub original_payment_id: Uuid,
  pub reversal_payment_id: Uuid,
  pub status: String,
  pub paid: Decimal,
  pub outstanding: Decimal,
}

pub struct ReversePaymentUseCase {
  ledger: Arc<PaymentLedgerService>,
}

impl ReversePaymentUseCase {
  pub fn new(ledger: Arc<PaymentLedgerService>) -> Self {
    Self { ledger }
  }

  pub async fn execute(
    &self,
    command: ReversePaymentCommand,
  ) -> Result<ReversePaymentResponse, LedgerError> {
    let method = PaymentMethod::new(command.method)?;
    let reference = PaymentReference::from_input(command.reference)?;

    let (reversal, view) = self
      .ledger
      .reverse_payment(
        command.user_id,
        command.invoice_id,
        command.payment_id,
        method,
        reference,
        command.reason,
      )
      .await?;

    Ok(ReversePaymentResponse {
      invoice_id: command.invoice_id,
      original_payment_id: command.payment_id,
      reversal_payment_id: reversal.id,
      status: view.display_status.as_str().to_string(),
      paid: view.paid,
      outstanding: view.outstanding,
    })
  }
}
