//! Authentication service.
//!
//! Shopper registration is two-step: [`AuthService::initiate_registration`]
//! stores a pending record and emails a one-time code, then
//! [`AuthService::verify_registration`] turns it into an account. The seller
//! is a single credential pair from configuration.

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{SellerClaims, TokenKeys, UserClaims};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;

use instabasket_core::Email;

use crate::config::SellerConfig;
use crate::db::RepositoryError;
use crate::db::pending_users::{NewPendingUser, PendingUserRepository};
use crate::db::users::UserRepository;
use crate::models::{PendingUser, User};
use crate::services::email::{EmailService, generate_otp, otp_digest};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// How long a registration code stays valid.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    pending: PendingUserRepository<'a>,
    email: &'a EmailService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService) -> Self {
        Self {
            users: UserRepository::new(pool),
            pending: PendingUserRepository::new(pool),
            email,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Start a registration and email the verification code.
    ///
    /// Starting again for the same email replaces the earlier attempt.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingName`, `AuthError::InvalidEmail` or
    /// `AuthError::WeakPassword` for bad input.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    /// Returns `AuthError::Email` if the code cannot be sent.
    #[tracing::instrument(skip(self, password))]
    pub async fn initiate_registration(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PendingUser, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        let email = Email::parse(email)?;
        validate_password(password)?;

        if self.users.exists(&email).await? {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        let code = generate_otp();
        let digest = otp_digest(&code);

        let pending = self
            .pending
            .upsert(NewPendingUser {
                name,
                email: &email,
                password_hash: &password_hash,
                otp_digest: &digest,
                otp_expires_at: Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            })
            .await?;

        self.email
            .send_otp(email.as_str(), name, &code, OTP_TTL_MINUTES)
            .await?;

        tracing::info!(pending_user_id = %pending.id, "Registration started");
        Ok(pending)
    }

    /// Confirm a registration code and create the account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoPendingRegistration` if nothing is pending.
    /// Returns `AuthError::OtpExpired` (after deleting the pending record) if
    /// the code expired.
    /// Returns `AuthError::OtpMismatch` if the code is wrong.
    #[tracing::instrument(skip(self, otp))]
    pub async fn verify_registration(&self, email: &str, otp: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let pending = self
            .pending
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::NoPendingRegistration)?;

        if pending.is_expired_at(Utc::now()) {
            self.pending.delete(pending.id).await?;
            return Err(AuthError::OtpExpired);
        }

        if !constant_time_compare(&otp_digest(otp), &pending.otp_digest) {
            return Err(AuthError::OtpMismatch);
        }

        let user = self.pending.promote(&pending).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;

        tracing::info!(user_id = %user.id, "Registration verified");
        Ok(user)
    }

    /// Issue and email a fresh code for a pending registration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoPendingRegistration` if nothing is pending.
    /// Returns `AuthError::Email` if the code cannot be sent.
    #[tracing::instrument(skip(self))]
    pub async fn resend_code(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let code = generate_otp();

        let pending = self
            .pending
            .replace_otp(
                &email,
                &otp_digest(&code),
                Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
            )
            .await?
            .ok_or(AuthError::NoPendingRegistration)?;

        self.email
            .send_otp(email.as_str(), &pending.name, &code, OTP_TTL_MINUTES)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Load the user behind a verified token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn current_user(&self, claims: &UserClaims) -> Result<User, AuthError> {
        self.users
            .get_by_id(claims.id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Check the seller credential pair. Both comparisons always run.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on any mismatch.
pub fn verify_seller_credentials(
    seller: &SellerConfig,
    email: &str,
    password: &str,
) -> Result<(), AuthError> {
    let email_ok = constant_time_compare(&email.trim().to_lowercase(), &seller.email);
    let password_ok = constant_time_compare(password, seller.password.expose_secret());

    if email_ok && password_ok {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

/// Compare two strings without short-circuiting on the first differing byte.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn seller() -> SellerConfig {
        SellerConfig {
            email: "seller@instabasket.io".to_string(),
            password: SecretString::from("greens-and-grains"),
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hello!"));
    }

    #[test]
    fn test_password_length_rule() {
        assert!(matches!(
            validate_password("12345"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("fresh-basil").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("fresh-basil", &hash).is_ok());
        assert!(matches!(
            verify_password("stale-basil", &hash),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(verify_password("fresh-basil", "not-a-hash").is_err());
    }

    #[test]
    fn test_seller_credentials() {
        let seller = seller();
        assert!(verify_seller_credentials(&seller, "seller@instabasket.io", "greens-and-grains").is_ok());
        assert!(verify_seller_credentials(&seller, " Seller@InstaBasket.io ", "greens-and-grains").is_ok());
        assert!(verify_seller_credentials(&seller, "seller@instabasket.io", "wrong").is_err());
        assert!(verify_seller_credentials(&seller, "buyer@instabasket.io", "greens-and-grains").is_err());
    }
}
