//! Business logic services for the storefront API.
//!
//! # Services
//!
//! - `auth` - Registration with emailed codes, login, session tokens
//! - `checkout` - Order validation, pricing and placement (COD and online)
//! - `email` - SMTP delivery of registration codes
//! - `stripe` - Stripe REST client and webhook signature checks
//! - `sweeper` - Background removal of expired registrations
//! - `webhook` - Idempotent application of Stripe events

pub mod auth;
pub mod checkout;
pub mod email;
pub mod stripe;
pub mod sweeper;
pub mod webhook;
