//! One-off maintenance commands.

use instabasket_storefront::db::RepositoryError;
use instabasket_storefront::services::sweeper;
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur while purging.
#[derive(Debug, Error)]
pub enum PurgeError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Delete expired pending registrations, same as one sweeper tick.
///
/// # Errors
///
/// Returns `PurgeError` if the database is unreachable or the delete fails.
pub async fn pending() -> Result<(), PurgeError> {
    let pool = connect().await?;
    let removed = sweeper::purge_expired_pending(&pool).await?;
    tracing::info!(removed, "Pending registrations purged");
    Ok(())
}
