use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::invoice::{
  BalanceGuard, Description, Invoice, InvoiceItem, InvoiceNumber, InvoiceRepository,
  InvoiceStatus, InvoiceWithLedger, LedgerError, Money, Payment, Quantity, VatRate, Version,
};

use super::payment_repository::PaymentRow;

#[derive(Debug, FromRow)]
struct InvoiceRow {
  id: Uuid,
  customer_id: Uuid,
  invoice_number: String,
  issue_date: NaiveDate,
  due_date: NaiveDate,
  status: String,
  subtotal: Decimal,
  vat_total: Decimal,
  total: Decimal,
  created_by: Uuid,
  created_at: DateTime<Utc>,
  version: i64,
}

impl TryFrom<InvoiceRow> for Invoice {
  type Error = LedgerError;

  fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
    let invoice_number = InvoiceNumber::new(row.invoice_number)?;
    let status = InvoiceStatus::from_str(&row.status)?;

    Ok(Invoice {
      id: row.id,
      customer_id: row.customer_id,
      invoice_number,
      issue_date: row.issue_date,
      due_date: row.due_date,
      status,
      subtotal: row.subtotal,
      vat_total: row.vat_total,
      total: row.total,
      created_by: row.created_by,
      created_at: row.created_at,
      version: Version::from_raw(row.version),
    })
  }
}

#[derive(Debug, FromRow)]
struct ItemRow {
  id: Uuid,
  invoice_id: Uuid,
  description: String,
  qty: i32,
  unit_price: Decimal,
  vat_rate: Decimal,
  line_total: Decimal,
  vat_amount: Decimal,
}

impl TryFrom<ItemRow> for InvoiceItem {
  type Error = LedgerError;

  fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
    let description = Description::new(row.description)?;
    let qty = Quantity::new(row.qty)?;
    let unit_price = Money::new(row.unit_price)?;
    let vat_rate = VatRate::new(row.vat_rate)?;

    Ok(InvoiceItem {
      id: row.id,
      invoice_id: row.invoice_id,
      description,
      qty,
      unit_price,
      vat_rate,
      line_total: row.line_total,
      vat_amount: row.vat_amount,
    })
  }
}

pub struct PostgresInvoiceRepository {
  pool: PgPool,
}

impl PostgresInvoiceRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
  async fn create(
    &self,
    invoice: Invoice,
    items: Vec<InvoiceItem>,
  ) -> Result<Invoice, LedgerError> {
    let invoice_number_value = invoice.invoice_number.value().to_string();
    let mut tx = self.pool.begin().await?;

    let row = sqlx::query_as::<_, InvoiceRow>(
      r#"
            INSERT INTO invoices (
                id, customer_id, invoice_number, issue_date, due_date, status,
                subtotal, vat_total, total, created_by, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, customer_id, invoice_number, issue_date, due_date, status,
                      subtotal, vat_total, total, created_by, created_at, version
            "#,
    )
    .bind(invoice.id)
    .bind(invoice.customer_id)
    .bind(invoice.invoice_number.value())
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.status.as_str())
    .bind(invoice.subtotal)
    .bind(invoice.vat_total)
    .bind(invoice.total)
    .bind(invoice.created_by)
    .bind(invoice.created_at)
    .bind(invoice.version.value())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
      if let sqlx::Error::Database(db_err) = &e {
        // PostgreSQL unique violation
        if db_err.code().as_deref() == Some("23505")
          && db_err.constraint() == Some("invoices_number_unique")
        {
          return LedgerError::InvoiceNumberExists(invoice_number_value.clone());
        }
      }
      LedgerError::Database(e)
    })?;

    for item in &items {
      sqlx::query(
        r#"
                INSERT INTO invoice_items (
                    id, invoice_id, description, qty, unit_price,
                    vat_rate, line_total, vat_amount
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
      )
      .bind(item.id)
      .bind(item.invoice_id)
      .bind(item.description.value())
      .bind(item.qty.value())
      .bind(item.unit_price.value())
      .bind(item.vat_rate.value())
      .bind(item.line_total)
      .bind(item.vat_amount)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    row.try_into()
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, LedgerError> {
    let row = sqlx::query_as::<_, InvoiceRow>(
      r#"
            SELECT id, customer_id, invoice_number, issue_date, due_date, status,
                   subtotal, vat_total, total, created_by, created_at, version
            FROM invoices
            WHERE id = $1
            "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    row.map(|r| r.try_into()).transpose()
  }

  async fn find_with_ledger(&self, id: Uuid) -> Result<Option<InvoiceWithLedger>, LedgerError> {
    // One transaction so the invoice, items, and entry stream are a
    // consistent snapshot
    let mut tx = self.pool.begin().await?;

    let invoice_row = sqlx::query_as::<_, InvoiceRow>(
      r#"
            SELECT id, customer_id, invoice_number, issue_date, due_date, status,
                   subtotal, vat_total, total, created_by, created_at, version
            FROM invoices
            WHERE id = $1
            "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(invoice_row) = invoice_row else {
      return Ok(None);
    };

    let item_rows = sqlx::query_as::<_, ItemRow>(
      r#"
            SELECT id, invoice_id, description, qty, unit_price,
                   vat_rate, line_total, vat_amount
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY id ASC
            "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let payment_rows = sqlx::query_as::<_, PaymentRow>(
      r#"
            SELECT id, invoice_id, amount, method, reference, reason,
                   reversed_payment_id, captured_by, captured_at
            FROM payments
            WHERE invoice_id = $1
            ORDER BY captured_at ASC, id ASC
            "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let invoice: Invoice = invoice_row.try_into()?;
    let items = item_rows
      .into_iter()
      .map(|r| r.try_into())
      .collect::<Result<Vec<InvoiceItem>, LedgerError>>()?;
    let payments = payment_rows
      .into_iter()
      .map(|r| r.try_into())
      .collect::<Result<Vec<Payment>, LedgerError>>()?;

    Ok(Some(InvoiceWithLedger {
      invoice,
      items,
      payments,
    }))
  }

  async fn list_with_payments(&self) -> Result<Vec<(Invoice, Vec<Payment>)>, LedgerError> {
    let mut tx = self.pool.begin().await?;

    let invoice_rows = sqlx::query_as::<_, InvoiceRow>(
      r#"
            SELECT id, customer_id, invoice_number, issue_date, due_date, status,
                   subtotal, vat_total, total, created_by, created_at, version
            FROM invoices
            ORDER BY created_at DESC
            "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let payment_rows = sqlx::query_as::<_, PaymentRow>(
      r#"
            SELECT id, invoice_id, amount, method, reference, reason,
                   reversed_payment_id, captured_by, captured_at
            FROM payments
            ORDER BY captured_at ASC, id ASC
            "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let mut by_invoice: HashMap<Uuid, Vec<Payment>> = HashMap::new();
    for row in payment_rows {
      let payment: Payment = row.try_into()?;
      by_invoice.entry(payment.invoice_id).or_default().push(payment);
    }

    invoice_rows
      .into_iter()
      .map(|row| {
        let invoice: Invoice = row.try_into()?;
        let payments = by_invoice.remove(&invoice.id).unwrap_or_default();
        Ok((invoice, payments))
      })
      .collect()
  }

  async fn transition_status(
    &self,
    id: Uuid,
    new_status: InvoiceStatus,
    expected_version: Version,
    guard: BalanceGuard,
  ) -> Result<Invoice, LedgerError> {
    let mut tx = self.pool.begin().await?;

    let current = sqlx::query_as::<_, InvoiceRow>(
      r#"
            SELECT id, customer_id, invoice_number, issue_date, due_date, status,
                   subtotal, vat_total, total, created_by, created_at, version
            FROM invoices
            WHERE id = $1
            FOR UPDATE
            "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(LedgerError::InvoiceNotFound(id))?;

    if current.version != expected_version.value() {
      return Err(LedgerError::VersionConflict);
    }

    if guard == BalanceGuard::RequireNoNetPayments {
      // Appends never bump the version token, so the balance must be
      // re-read under the row lock
      let paid: Decimal =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1")
          .bind(id)
          .fetch_one(&mut *tx)
          .await?;

      if paid > Decimal::ZERO {
        return Err(LedgerError::CannotCancelWithPayments { paid });
      }
    }

    let row = sqlx::query_as::<_, InvoiceRow>(
      r#"
            UPDATE invoices
            SET status = $2, version = version + 1
            WHERE id = $1
            RETURNING id, customer_id, invoice_number, issue_date, due_date, status,
                      subtotal, vat_total, total, created_by, created_at, version
            "#,
    )
    .bind(id)
    .bind(new_status.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    row.try_into()
  }
}
