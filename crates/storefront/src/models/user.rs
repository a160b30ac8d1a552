//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use instabasket_core::{Cart, Email, PendingUserId, UserId};

/// A registered shopper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Normalized email address.
    pub email: Email,
    /// Persisted cart, restored by the SPA on load.
    pub cart_items: Cart,
    /// Whether the user has admin rights (not used by any route yet).
    #[serde(skip)]
    pub is_admin: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A registration awaiting OTP confirmation.
///
/// Only a SHA-256 digest of the code is kept, never the code itself.
#[derive(Debug, Clone)]
pub struct PendingUser {
    pub id: PendingUserId,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub otp_digest: String,
    pub otp_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingUser {
    /// Whether the OTP has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.otp_expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_pending_user_expiry() {
        let now = Utc::now();
        let pending = PendingUser {
            id: PendingUserId::new(1),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            password_hash: "hash".to_string(),
            otp_digest: "digest".to_string(),
            otp_expires_at: now,
            created_at: now - Duration::minutes(10),
        };

        assert!(!pending.is_expired_at(now));
        assert!(pending.is_expired_at(now + Duration::seconds(1)));
    }

    #[test]
    fn test_user_serializes_without_admin_flag() {
        let now = Utc::now();
        let user = User {
            id: UserId::new(3),
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            cart_items: Cart::from_quantities([(instabasket_core::ProductId::new(9), 2)]).unwrap(),
            is_admin: true,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["cartItems"]["9"], 2);
        assert_eq!(json["email"], "ada@example.com");
        assert!(json.get("isAdmin").is_none());
    }
}
