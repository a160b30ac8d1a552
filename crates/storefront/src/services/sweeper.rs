//! Periodic cleanup of expired pending registrations.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::db::{PendingUserRepository, RepositoryError};

/// How often expired registrations are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Delete every pending registration whose code has expired.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn purge_expired_pending(pool: &PgPool) -> Result<u64, RepositoryError> {
    let removed = PendingUserRepository::new(pool)
        .delete_expired(Utc::now())
        .await?;
    if removed > 0 {
        tracing::info!(removed, "Expired pending registrations removed");
    }
    Ok(removed)
}

/// Run [`purge_expired_pending`] every [`SWEEP_INTERVAL`] until aborted.
pub fn spawn(pool: PgPool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = purge_expired_pending(&pool).await {
                tracing::error!(error = %e, "Pending registration sweep failed");
            }
        }
    })
}
