//! Core types for InstaBasket.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod pricing;
pub mod status;

pub use cart::{Cart, CartError};
pub use email::{Email, EmailError};
pub use id::*;
pub use pricing::{LineAmount, PricingError, ProductPricing, TAX_RATE_PERCENT};
pub use status::*;
