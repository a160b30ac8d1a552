//! Seller session route handlers.

use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{RequireSeller, SELLER_COOKIE, removal_cookie, session_cookie};
use crate::services::auth::verify_seller_credentials;
use crate::state::AppState;

/// Seller login body.
#[derive(Debug, Deserialize)]
pub struct SellerLoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/seller/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SellerLoginRequest>,
) -> Result<impl IntoResponse> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let seller = &state.config().seller;
    verify_seller_credentials(seller, &body.email, &body.password)?;

    let token = state.tokens().issue_seller(&seller.email)?;
    let jar = jar.add(session_cookie(SELLER_COOKIE, token, state.config().environment));

    tracing::info!("Seller logged in");
    Ok((jar, Json(json!({ "success": true, "message": "Logged in" }))))
}

/// GET /api/seller/auth
pub async fn check_auth(RequireSeller(_claims): RequireSeller) -> impl IntoResponse {
    Json(json!({ "success": true }))
}

/// GET /api/seller/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(removal_cookie(SELLER_COOKIE, state.config().environment));
    (jar, Json(json!({ "success": true, "message": "Logged out" })))
}
