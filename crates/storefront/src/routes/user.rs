//! Shopper account route handlers.
//!
//! Registration is initiate → emailed code → verify; a successful verify or
//! login sets the `token` cookie.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireUser, USER_COOKIE, removal_cookie, session_cookie};
use crate::models::User;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Registration start body.
#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration confirmation body.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

/// Code resend body.
#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    #[serde(default)]
    pub email: String,
}

/// Login body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/user/register/initiate
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register_initiate(
    State(state): State<AppState>,
    Json(body): Json<InitiateRequest>,
) -> Result<impl IntoResponse> {
    AuthService::new(state.pool(), state.email())
        .initiate_registration(&body.name, &body.email, &body.password)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Verification code sent to your email",
    })))
}

/// POST /api/user/register/verify
#[instrument(skip(state, jar, body), fields(email = %body.email))]
pub async fn register_verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyRequest>,
) -> Result<impl IntoResponse> {
    if body.otp.trim().is_empty() {
        return Err(AppError::BadRequest("Email and OTP are required".to_string()));
    }

    let user = AuthService::new(state.pool(), state.email())
        .verify_registration(&body.email, &body.otp)
        .await?;

    let jar = sign_in(&state, jar, &user)?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "user": user,
        })),
    ))
}

/// POST /api/user/register/resend
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register_resend(
    State(state): State<AppState>,
    Json(body): Json<ResendRequest>,
) -> Result<impl IntoResponse> {
    AuthService::new(state.pool(), state.email())
        .resend_code(&body.email)
        .await
        .map_err(|e| match e {
            AuthError::NoPendingRegistration => {
                AppError::NotFound("No pending registration found for this email".to_string())
            }
            other => other.into(),
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "A new verification code has been sent",
    })))
}

/// POST /api/user/login
#[instrument(skip(state, jar, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest("Please fill all fields".to_string()));
    }

    let user = AuthService::new(state.pool(), state.email())
        .login(&body.email, &body.password)
        .await?;

    let jar = sign_in(&state, jar, &user)?;
    Ok((
        jar,
        Json(json!({
            "success": true,
            "message": "User logged in successfully",
            "user": user,
        })),
    ))
}

/// GET /api/user/auth
#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn check_auth(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool(), state.email())
        .current_user(&claims)
        .await?;

    Ok(Json(json!({ "success": true, "user": user })))
}

/// GET /api/user/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    RequireUser(_claims): RequireUser,
) -> impl IntoResponse {
    clear_sentry_user();
    let jar = jar.add(removal_cookie(USER_COOKIE, state.config().environment));
    (
        jar,
        Json(json!({ "success": true, "message": "User logged out successfully" })),
    )
}

fn sign_in(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar> {
    let token = state.tokens().issue_user(user.id, user.email.as_str())?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(jar.add(session_cookie(USER_COOKIE, token, state.config().environment)))
}
