//! statsgate core - configuration and domain values
//!
//! This crate holds everything the governed client needs to know before it
//! makes a single request:
//! - **Configuration** - YAML file, defaults, validation, builder
//! - **Budgets** - `RateBudget` and `RetryBackoff`, immutable once built
//! - **Cache policy** - `TtlClass` volatility classes and their lifetimes
//! - **Identifiers** - validated, URL-path-safe provider ids and schedule dates
//!
//! It performs no network I/O.

pub mod config;
pub mod domain;
