//! Shipping address route handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::AddressInput;
use crate::state::AppState;

/// Address creation body: `{"address": {...}}`.
#[derive(Debug, Deserialize)]
pub struct AddAddressRequest {
    pub address: Option<AddressInput>,
}

/// POST /api/address/add
#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Json(body): Json<AddAddressRequest>,
) -> Result<impl IntoResponse> {
    let address = body
        .address
        .ok_or_else(|| AppError::BadRequest("Address is required".to_string()))?
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let address = AddressRepository::new(state.pool())
        .create(claims.id, &address)
        .await?;

    tracing::info!(address_id = %address.id, "Address added");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Address added successfully",
            "address": address,
        })),
    ))
}

/// GET /api/address/get
#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
) -> Result<impl IntoResponse> {
    let addresses = AddressRepository::new(state.pool())
        .list_for_user(claims.id)
        .await?;

    Ok(Json(json!({ "success": true, "addresses": addresses })))
}
