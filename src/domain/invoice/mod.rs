pub mod entities;
pub mod errors;
pub mod ports;
pub mod projection;
pub mod services;
pub mod value_objects;

pub use entities::{Customer, Invoice, InvoiceItem, InvoiceTotals, LineInput, Payment};
pub use errors::{ErrorKind, LedgerError};
pub use ports::{
  BalanceGuard, CustomerDirectory, InvoiceRepository, InvoiceWithLedger, PaymentRepository,
};
pub use projection::LedgerView;
pub use services::{InvoiceDraft, InvoiceLifecycleService, PaymentLedgerService};
pub use value_objects::{
  Description, DisplayStatus, InvoiceNumber, InvoiceStatus, Money, PaymentMethod,
  PaymentReference, Quantity, ValueObjectError, VatRate, Version,
};
