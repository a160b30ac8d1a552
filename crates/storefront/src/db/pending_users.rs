//! Pending registration repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use instabasket_core::{Email, PendingUserId};

use super::{RepositoryError, users};
use crate::models::{PendingUser, User};

const PENDING_COLUMNS: &str =
    "id, name, email, password_hash, otp_digest, otp_expires_at, created_at";

#[derive(sqlx::FromRow)]
struct PendingUserRow {
    id: PendingUserId,
    name: String,
    email: String,
    password_hash: String,
    otp_digest: String,
    otp_expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingUserRow> for PendingUser {
    type Error = RepositoryError;

    fn try_from(row: PendingUserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            password_hash: row.password_hash,
            otp_digest: row.otp_digest,
            otp_expires_at: row.otp_expires_at,
            created_at: row.created_at,
        })
    }
}

/// Fields for a new (or restarted) registration.
pub struct NewPendingUser<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub otp_digest: &'a str,
    pub otp_expires_at: DateTime<Utc>,
}

/// Repository for pending registrations.
pub struct PendingUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PendingUserRepository<'a> {
    /// Create a new pending user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a registration, replacing any earlier one for the same email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, new: NewPendingUser<'_>) -> Result<PendingUser, RepositoryError> {
        let sql = format!(
            "INSERT INTO storefront.pending_user \
                 (name, email, password_hash, otp_digest, otp_expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (email) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 password_hash = EXCLUDED.password_hash, \
                 otp_digest = EXCLUDED.otp_digest, \
                 otp_expires_at = EXCLUDED.otp_expires_at, \
                 created_at = NOW() \
             RETURNING {PENDING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PendingUserRow>(&sql)
            .bind(new.name)
            .bind(new.email)
            .bind(new.password_hash)
            .bind(new.otp_digest)
            .bind(new.otp_expires_at)
            .fetch_one(self.pool)
            .await?;

        PendingUser::try_from(row)
    }

    /// Get the pending registration for an email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<PendingUser>, RepositoryError> {
        let sql = format!("SELECT {PENDING_COLUMNS} FROM storefront.pending_user WHERE email = $1");
        sqlx::query_as::<_, PendingUserRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?
            .map(PendingUser::try_from)
            .transpose()
    }

    /// Replace the OTP of an existing registration.
    ///
    /// Returns `None` if there is no pending registration for the email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn replace_otp(
        &self,
        email: &Email,
        otp_digest: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<Option<PendingUser>, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.pending_user SET otp_digest = $2, otp_expires_at = $3 \
             WHERE email = $1 RETURNING {PENDING_COLUMNS}"
        );
        sqlx::query_as::<_, PendingUserRow>(&sql)
            .bind(email)
            .bind(otp_digest)
            .bind(otp_expires_at)
            .fetch_optional(self.pool)
            .await?
            .map(PendingUser::try_from)
            .transpose()
    }

    /// Delete a pending registration.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: PendingUserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.pending_user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete every registration whose OTP expired before `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.pending_user WHERE otp_expires_at < $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Turn a confirmed registration into a user account.
    ///
    /// The user insert and the pending row delete commit together.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an account with the email exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn promote(&self, pending: &PendingUser) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user = users::insert(
            &mut *tx,
            &pending.name,
            &pending.email,
            &pending.password_hash,
        )
        .await?;

        sqlx::query("DELETE FROM storefront.pending_user WHERE id = $1")
            .bind(pending.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }
}
