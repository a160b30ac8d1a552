//! Signed session tokens.
//!
//! Shoppers and the seller each get an HS256 JWT in an httpOnly cookie.
//! Shopper claims carry the user id; seller claims only the seller email.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use instabasket_core::UserId;

use super::AuthError;

/// How long a token (and its cookie) stays valid.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Claims of a shopper token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: UserId,
    pub email: String,
    pub exp: i64,
}

/// Claims of a seller token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerClaims {
    pub email: String,
    pub exp: i64,
}

/// Keys for issuing and checking tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Derive both keys from the shared HS256 secret.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a shopper token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenSigning` if encoding fails.
    pub fn issue_user(&self, id: UserId, email: &str) -> Result<String, AuthError> {
        let claims = UserClaims {
            id,
            email: email.to_string(),
            exp: expiry(),
        };
        self.encode(&claims)
    }

    /// Issue a seller token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenSigning` if encoding fails.
    pub fn issue_seller(&self, email: &str) -> Result<String, AuthError> {
        let claims = SellerClaims {
            email: email.to_string(),
            exp: expiry(),
        };
        self.encode(&claims)
    }

    /// Check a shopper token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed, expired,
    /// or was not issued by [`Self::issue_user`].
    pub fn verify_user(&self, token: &str) -> Result<UserClaims, AuthError> {
        self.decode(token)
    }

    /// Check a seller token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed or expired.
    pub fn verify_seller(&self, token: &str) -> Result<SellerClaims, AuthError> {
        self.decode(token)
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(AuthError::TokenSigning)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Result<T, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<T>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }
}

fn expiry() -> i64 {
    (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new(&SecretString::from("kT9$vQ2!mZ7@pL4#xW8^rB1&nC5*hJ3%"))
    }

    #[test]
    fn test_user_token_round_trip() {
        let keys = keys();
        let token = keys.issue_user(UserId::new(12), "ada@example.com").unwrap();
        let claims = keys.verify_user(&token).unwrap();

        assert_eq!(claims.id, UserId::new(12));
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_seller_token_is_not_a_user_token() {
        let keys = keys();
        let token = keys.issue_seller("seller@instabasket.io").unwrap();

        assert!(keys.verify_seller(&token).is_ok());
        assert!(matches!(
            keys.verify_user(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let claims = UserClaims {
            id: UserId::new(1),
            email: "ada@example.com".to_string(),
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let token = keys.encode(&claims).unwrap();

        assert!(matches!(
            keys.verify_user(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let other = TokenKeys::new(&SecretString::from("zP4&wQ8!rN2@kL6#vB9^mX1*tC5%hJ7$"));
        let token = other.issue_user(UserId::new(1), "ada@example.com").unwrap();

        assert!(keys().verify_user(&token).is_err());
        assert!(keys().verify_user("not-a-jwt").is_err());
    }
}
