use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::invoice::{
  InvoiceStatus, LedgerError, Payment, PaymentMethod, PaymentReference, PaymentRepository,
};

#[derive(Debug, FromRow)]
pub(super) struct PaymentRow {
  pub(super) id: Uuid,
  pub(super) invoice_id: Uuid,
  pub(super) amount: Decimal,
  pub(super) method: String,
  pub(super) reference: Option<String>,
  pub(super) reason: Option<String>,
  pub(super) reversed_payment_id: Option<Uuid>,
  pub(super) captured_by: Uuid,
  pub(super) captured_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
  type Error = LedgerError;

  fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
    let method = PaymentMethod::new(row.method)?;
    let reference = row.reference.map(PaymentReference::new).transpose()?;

    Ok(Payment {
      id: row.id,
      invoice_id: row.invoice_id,
      amount: row.amount,
      method,
      reference,
      reason: row.reason,
      reversed_payment_id: row.reversed_payment_id,
      captured_by: row.captured_by,
      captured_at: row.captured_at,
    })
  }
}

#[derive(Debug, FromRow)]
struct InvoiceGuardRow {
  status: String,
  total: Decimal,
}

pub struct PostgresPaymentRepository {
  pool: PgPool,
}

impl PostgresPaymentRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
  async fn find_by_invoice(&self, invoice_id: Uuid) -> Result<Vec<Payment>, LedgerError> {
    let rows = sqlx::query_as::<_, PaymentRow>(
      r#"
            SELECT id, invoice_id, amount, method, reference, reason,
                   reversed_payment_id, captured_by, captured_at
            FROM payments
            WHERE invoice_id = $1
            ORDER BY captured_at ASC, id ASC
            "#,
    )
    .bind(invoice_id)
    .fetch_all(&self.pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
  }

  async fn append(&self, entry: Payment) -> Result<Payment, LedgerError> {
    let mut tx = self.pool.begin().await?;

    // The row lock serializes money movements per invoice without touching
    // the version token, so the guard checks below run against a snapshot
    // taken atomically with the insert.
    let invoice = sqlx::query_as::<_, InvoiceGuardRow>(
      r#"
            SELECT status, total
            FROM invoices
            WHERE id = $1
            FOR UPDATE
            "#,
    )
    .bind(entry.invoice_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(LedgerError::InvoiceNotFound(entry.invoice_id))?;

    match InvoiceStatus::from_str(&invoice.status)? {
      InvoiceStatus::Cancelled => return Err(LedgerError::LedgerEntryOnCancelled),
      InvoiceStatus::Draft => return Err(LedgerError::LedgerEntryOnDraft),
      InvoiceStatus::Issued => {}
    }

    let paid: Decimal =
      sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1")
        .bind(entry.invoice_id)
        .fetch_one(&mut *tx)
        .await?;

    if entry.amount > Decimal::ZERO {
      if paid + entry.amount > invoice.total {
        return Err(LedgerError::ExceedsOutstanding {
          amount: entry.amount,
          outstanding: invoice.total - paid,
        });
      }
      if let Some(reference) = &entry.reference {
        let exists: bool = sqlx::query_scalar(
          "SELECT EXISTS(SELECT 1 FROM payments WHERE invoice_id = $1 AND reference = $2)",
        )
        .bind(entry.invoice_id)
        .bind(reference.value())
        .fetch_one(&mut *tx)
        .await?;

        if exists {
          return Err(LedgerError::DuplicateReference(
            reference.value().to_string(),
          ));
        }
      }
    } else if let Some(target) = entry.reversed_payment_id {
      let original_amount: Decimal =
        sqlx::query_scalar("SELECT amount FROM payments WHERE id = $1 AND invoice_id = $2")
          .bind(target)
          .bind(entry.invoice_id)
          .fetch_optional(&mut *tx)
          .await?
          .ok_or(LedgerError::PaymentNotFound {
            invoice_id: entry.invoice_id,
            payment_id: target,
          })?;

      if original_amount <= Decimal::ZERO {
        return Err(LedgerError::NotAPayment(target));
      }

      let already_reversed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM payments WHERE reversed_payment_id = $1)",
      )
      .bind(target)
      .fetch_one(&mut *tx)
      .await?;

      if already_reversed {
        return Err(LedgerError::AlreadyReversed(target));
      }
      if paid <= Decimal::ZERO {
        return Err(LedgerError::NothingToReverse);
      }
    } else {
      if paid <= Decimal::ZERO {
        return Err(LedgerError::NothingToRefund);
      }
      if -entry.amount > paid {
        return Err(LedgerError::ExceedsPaid {
          amount: -entry.amount,
          paid,
        });
      }
    }

    sqlx::query(
      r#"
            INSERT INTO payments (
                id, invoice_id, amount, method, reference, reason,
                reversed_payment_id, captured_by, captured_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
    )
    .bind(entry.id)
    .bind(entry.invoice_id)
    .bind(entry.amount)
    .bind(entry.method.value())
    .bind(entry.reference.as_ref().map(|r| r.value().to_string()))
    .bind(entry.reason.clone())
    .bind(entry.reversed_payment_id)
    .bind(entry.captured_by)
    .bind(entry.captured_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
      if let sqlx::Error::Database(db_err) = &e {
        // Unique violations back the guards at the schema level
        if db_err.code().as_deref() == Some("23505") {
          if db_err.constraint() == Some("payments_invoice_reference_unique") {
            let reference = entry
              .reference
              .as_ref()
              .map(|r| r.value().to_string())
              .unwrap_or_default();
            return LedgerError::DuplicateReference(reference);
          }
          if db_err.constraint() == Some("payments_reversed_payment_unique") {
            return LedgerError::AlreadyReversed(entry.reversed_payment_id.unwrap_or(entry.id));
          }
        }
      }
      LedgerError::Database(e)
    })?;

    tx.commit().await?;
    Ok(entry)
  }
}
