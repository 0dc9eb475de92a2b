use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::domain::invoice::{Customer, CustomerDirectory, LedgerError};

#[derive(Debug, FromRow)]
struct CustomerRow {
  id: Uuid,
  name: String,
  email: Option<String>,
  phone: Option<String>,
  address: Option<String>,
  created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
  fn from(row: CustomerRow) -> Self {
    Customer {
      id: row.id,
      name: row.name,
      email: row.email,
      phone: row.phone,
      address: row.address,
      created_at: row.created_at,
    }
  }
}

/// Read-only lookup into the customer registry; customer CRUD is owned by an
/// external system.
pub struct PostgresCustomerDirectory {
  pool: PgPool,
}

impl PostgresCustomerDirectory {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl CustomerDirectory for PostgresCustomerDirectory {
  async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, LedgerError> {
    let row = sqlx::query_as::<_, CustomerRow>(
      r#"
            SELECT id, name, email, phone, address, created_at
            FROM customers
            WHERE id = $1
            "#,
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row.map(Customer::from))
  }
}
