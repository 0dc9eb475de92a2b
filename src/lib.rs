//! Invoice & payment ledger engine.
//!
//! Tracks invoices issued to customers and the payments, refunds, and
//! reversals applied against them as an append-only stream of signed ledger
//! entries. Paid and outstanding amounts and the display status are always
//! derived from the entry stream, never stored, and status transitions are
//! protected by an optimistic concurrency token.
//!
//! The crate is layered hexagonally: `domain` holds the engine and its
//! ports, `application` the command-shaped use cases, and `infrastructure`
//! the Postgres and in-memory store adapters, configuration, and audit
//! recorders. The HTTP surface, authentication, and customer CRUD live
//! outside this crate.

pub mod application;
pub mod domain;
pub mod infrastructure;
