use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::invoice::{LedgerError, PaymentLedgerService, PaymentMethod, PaymentReference};

#[derive(Debug, Deserialize)]
pub struct RefundPaymentCommand {
  pub user_id: Uuid,
  pub invoice_id: Uuid,
  pub amount: Decimal,
  pub method: String,
  pub reference: Option<String>,
  pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefundPaymentResponse {
  pub invoice_id: Uuid,
  pub refund_payment_id: Uuid,
  pub status: String,
  pub paid: Decimal,
  pub outstanding: Decimal,
}

pub struct RefundPaymentUseCase {
  ledger: Arc<PaymentLedgerService>,
}

impl RefundPaymentUseCase {
  pub fn new(ledger: Arc<PaymentLedgerService>) -> Self {
    Self { ledger }
  }

  pub async fn execute(
    &self,
    command: RefundPaymentCommand,
  ) -> Result<RefundPaymentResponse, LedgerError> {
    let method = PaymentMethod::new(command.method)?;
    let reference = PaymentReference::from_input(command.reference)?;

    let (refund, view) = self
      .ledger
      .refund(
        command.user_id,
        command.invoice_id,
        command.amount,
        method,
        reference,
        command.reason,
      )
      .await?;

    Ok(RefundPaymentResponse {
      invoice_id: command.invoice_id,
      refund_payment_id: refund.id,
      status: view.display_status.as_str().to_string(),
      paid: view.paid,
      outstanding: view.outstanding,
    })
  }
}
