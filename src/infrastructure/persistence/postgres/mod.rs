pub mod customer_directory;
pub mod invoice_repository;
pub mod payment_repository;

pub use customer_directory::PostgresCustomerDirectory;
pub use invoice_repository::PostgresInvoiceRepository;
pub use payment_repository::PostgresPaymentRepository;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::infrastructure::config::DatabaseConfig;

/// Connection pool with the configured limits and timeouts.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
  PgPoolOptions::new()
    .max_connections(config.max_connections)
    .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
    .connect(&config.url)
    .await
}

/// Applies the schema migrations bundled with the crate.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
  sqlx::migrate!("./migrations").run(pool).await
}
