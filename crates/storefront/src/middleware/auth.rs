//! Authentication extractors and cookies.
//!
//! Shoppers carry a JWT in the `token` cookie, the seller in `sellerToken`.
//! Both cookies are httpOnly; in production they are also `Secure` and
//! `SameSite=None` so the SPA can live on another origin.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::Environment;
use crate::error::{AppError, set_sentry_user};
use crate::services::auth::token::TOKEN_TTL_DAYS;
use crate::services::auth::{AuthError, SellerClaims, UserClaims, constant_time_compare};
use crate::state::AppState;

/// Cookie holding the shopper token.
pub const USER_COOKIE: &str = "token";

/// Cookie holding the seller token.
pub const SELLER_COOKIE: &str = "sellerToken";

/// Extractor that requires a valid shopper token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(claims): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", claims.email)
/// }
/// ```
pub struct RequireUser(pub UserClaims);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(USER_COOKIE).ok_or(AuthError::MissingToken)?;
        let claims = state.tokens().verify_user(token.value())?;

        set_sentry_user(&claims.id, Some(&claims.email));
        tracing::Span::current().record("user_id", tracing::field::display(claims.id));

        Ok(Self(claims))
    }
}

/// Extractor that requires a valid seller token for the configured seller.
pub struct RequireSeller(pub SellerClaims);

impl FromRequestParts<AppState> for RequireSeller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(SELLER_COOKIE).ok_or(AuthError::MissingToken)?;
        let claims = state.tokens().verify_seller(token.value())?;

        if !constant_time_compare(&claims.email, &state.config().seller.email) {
            return Err(AuthError::NotSeller.into());
        }

        Ok(Self(claims))
    }
}

/// Build a session cookie carrying `token`.
#[must_use]
pub fn session_cookie(name: &'static str, token: String, environment: Environment) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::days(TOKEN_TTL_DAYS));

    cookie = if environment.is_production() {
        cookie.secure(true).same_site(SameSite::None)
    } else {
        cookie.same_site(SameSite::Strict)
    };

    cookie.build()
}

/// Build a cookie that removes the named session cookie.
///
/// Attributes must match the ones the cookie was set with.
#[must_use]
pub fn removal_cookie(name: &'static str, environment: Environment) -> Cookie<'static> {
    let mut cookie = session_cookie(name, String::new(), environment);
    cookie.make_removal();
    cookie
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, header};
    use instabasket_core::UserId;

    use super::*;

    async fn extract_user(cookie: Option<String>) -> Result<RequireUser, AppError> {
        let state = AppState::for_tests();
        let mut builder = Request::builder().uri("/api/user/auth");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        RequireUser::from_request_parts(&mut parts, &state).await
    }

    async fn extract_seller(cookie: String) -> Result<RequireSeller, AppError> {
        let state = AppState::for_tests();
        let (mut parts, ()) = Request::builder()
            .uri("/api/seller/auth")
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        RequireSeller::from_request_parts(&mut parts, &state).await
    }

    #[test]
    fn test_development_cookie_attributes() {
        let cookie = session_cookie(USER_COOKIE, "abc".to_string(), Environment::Development);
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), None);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn test_production_cookie_attributes() {
        let cookie = session_cookie(SELLER_COOKIE, "abc".to_string(), Environment::Production);
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_removal_cookie_expires() {
        let cookie = removal_cookie(USER_COOKIE, Environment::Development);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }

    #[tokio::test]
    async fn test_require_user_accepts_valid_token() {
        let state = AppState::for_tests();
        let token = state
            .tokens()
            .issue_user(UserId::new(5), "ada@example.com")
            .unwrap();

        let RequireUser(claims) = extract_user(Some(format!("token={token}"))).await.unwrap();
        assert_eq!(claims.id, UserId::new(5));
    }

    #[tokio::test]
    async fn test_require_user_rejects_missing_or_bad_token() {
        assert!(matches!(
            extract_user(None).await,
            Err(AppError::Auth(AuthError::MissingToken))
        ));
        assert!(matches!(
            extract_user(Some("token=garbage".to_string())).await,
            Err(AppError::Auth(AuthError::InvalidToken(_)))
        ));
    }

    #[tokio::test]
    async fn test_require_seller_checks_email() {
        let state = AppState::for_tests();
        let good = state.tokens().issue_seller("seller@instabasket.io").unwrap();
        let other = state.tokens().issue_seller("mallory@example.com").unwrap();

        assert!(extract_seller(format!("sellerToken={good}")).await.is_ok());
        assert!(matches!(
            extract_seller(format!("sellerToken={other}")).await,
            Err(AppError::Auth(AuthError::NotSeller))
        ));
    }
}
