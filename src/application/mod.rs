//! Application layer
//!
//! Use cases that orchestrate the domain services to implement the ledger
//! operations. Each use case parses raw command input into value objects and
//! delegates to the lifecycle or payment ledger engine.

pub mod invoice;
