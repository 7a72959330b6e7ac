//! `invoicechain-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! account addresses, the domain error taxonomy and the aggregate traits every
//! ledger module builds on.

pub mod address;
pub mod aggregate;
pub mod error;

pub use address::Address;
pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion, execute};
pub use error::{DomainError, DomainResult};
