//! `jobwork-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy shared by every ledger operation, and the
//! versioning contract used for optimistic concurrency.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{TenantId, UserId};
