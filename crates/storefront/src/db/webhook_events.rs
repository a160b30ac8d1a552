//! Processed Stripe webhook events.

use sqlx::PgConnection;

use super::RepositoryError;

/// Record that an event is being processed.
///
/// Returns `false` if the event id was already recorded. Run this inside the
/// transaction that applies the event so a rollback also forgets the id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn record(
    conn: &mut PgConnection,
    event_id: &str,
    event_type: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO storefront.processed_webhook_event (event_id, event_type) \
         VALUES ($1, $2) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
