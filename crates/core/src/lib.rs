//! InstaBasket Core - Shared domain types.
//!
//! This crate provides the types used across all InstaBasket components:
//! - `storefront` - The REST API behind the shopping SPA
//! - `cli` - Command-line tools for migrations, seeding and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Order totals are computed here so that the API,
//! the CLI and the tests all agree on the same rounding rule.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, carts, pricing rules and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
