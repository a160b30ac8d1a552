//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `user` - Shopper accounts and their persisted cart (JSONB)
//! - `pending_user` - Registrations waiting for OTP confirmation
//! - `product` - Catalog, with `offer_price < price` and `stock >= 0` checks
//! - `address` - Shopper shipping addresses
//! - `customer_order` / `order_item` - Orders and their priced lines
//! - `processed_webhook_event` - Stripe event ids already handled
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p instabasket-cli -- migrate
//! ```
//!
//! Repositories borrow the pool. Steps that must share a transaction with
//! other tables (webhook processing) are free functions taking a
//! `&mut PgConnection`.

pub mod addresses;
pub mod orders;
pub mod pending_users;
pub mod products;
pub mod users;
pub mod webhook_events;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use orders::OrderRepository;
pub use pending_users::PendingUserRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_unique_violation(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Convert a stored `INTEGER` count to `u32`, rejecting negatives.
pub(crate) fn count_from_db(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a `u32` count to the `INTEGER` column type.
pub(crate) fn count_to_db(value: u32, column: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{column} out of range: {value}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_conversions() {
        assert_eq!(count_from_db(7, "stock").ok(), Some(7));
        assert!(matches!(
            count_from_db(-1, "stock"),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert_eq!(count_to_db(7, "stock").ok(), Some(7));
        assert!(count_to_db(u32::MAX, "stock").is_err());
    }

    #[test]
    fn test_non_unique_errors_stay_database_errors() {
        let err = RepositoryError::from_unique_violation(sqlx::Error::RowNotFound, "email");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
