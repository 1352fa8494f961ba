//! Domain types
//!
//! - Validated identifiers that end up in request paths
//! - Request budgets (rate, burst, concurrency, queue depth, retries)
//! - Cache TTL classes and policy
//! - Domain-specific error types

pub mod budget;
pub mod errors;
pub mod newtypes;
pub mod ttl;

pub use budget::{RateBudget, RetryBackoff};
pub use errors::DomainError;
pub use newtypes::*;
pub use ttl::{CachePolicy, TtlClass};
