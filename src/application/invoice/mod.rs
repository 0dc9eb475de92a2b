pub mod apply_payment;
pub mod cancel_invoice;
pub mod create_invoice;
pub mod get_invoice;
pub mod issue_invoice;
pub mod list_invoices;
pub mod refund_payment;
pub mod reverse_payment;

pub use apply_payment::{ApplyPaymentCommand, ApplyPaymentResponse, ApplyPaymentUseCase};
pub use cancel_invoice::{CancelInvoiceCommand, CancelInvoiceResponse, CancelInvoiceUseCase};
pub use create_invoice::{
  CreateInvoiceCommand, CreateInvoiceItemDto, CreateInvoiceResponse, CreateInvoiceUseCase,
};
pub use get_invoice::{
  CustomerSummaryDto, GetInvoiceCommand, GetInvoiceResponse, GetInvoiceUseCase, InvoiceItemDto,
  PaymentEntryDto,
};
pub use issue_invoice::{IssueInvoiceCommand, IssueInvoiceResponse, IssueInvoiceUseCase};
pub use list_invoices::{InvoiceListItemDto, ListInvoicesResponse, ListInvoicesUseCase};
pub use refund_payment::{RefundPaymentCommand, RefundPaymentResponse, RefundPaymentUseCase};
pub use reverse_payment::{ReversePaymentCommand, ReversePaymentResponse, ReversePaymentUseCase};
