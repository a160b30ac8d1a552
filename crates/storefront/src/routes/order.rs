//! Order route handlers.
//!
//! Placement goes through [`CheckoutService`]; listings only show orders
//! that are cash on delivery or already paid online.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use instabasket_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireSeller, RequireUser};
use crate::services::checkout::{CheckoutRequest, CheckoutService};
use crate::state::AppState;

/// Status change body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub order_id: OrderId,
    pub status: String,
}

fn checkout(state: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(state.pool(), state.stripe(), &state.config().frontend_url)
}

/// POST /api/order/cod
#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn place_cod(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<impl IntoResponse> {
    let order = checkout(&state).place_cod(claims.id, &body).await?;

    let order_id = order.id.to_string();
    add_breadcrumb(
        "checkout",
        "COD order placed",
        Some(&[("order_id", order_id.as_str())]),
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order placed successfully",
            "orderId": order.id,
        })),
    ))
}

/// POST /api/order/stripe
#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn place_online(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<impl IntoResponse> {
    let url = checkout(&state).start_online(claims.id, &body).await?;

    add_breadcrumb("checkout", "Online checkout started", None);
    Ok(Json(json!({ "success": true, "url": url })))
}

/// GET /api/order/user
#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn user_orders(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(claims.id)
        .await?;

    Ok(Json(json!({ "success": true, "orders": orders })))
}

/// GET /api/order/seller
#[instrument(skip_all)]
pub async fn seller_orders(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool()).list_all().await?;

    Ok(Json(json!({ "success": true, "orders": orders })))
}

/// POST /api/order/status
#[instrument(skip_all, fields(order_id = %body.order_id, status = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
    Json(body): Json<StatusRequest>,
) -> Result<impl IntoResponse> {
    let next: OrderStatus = body
        .status
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown order status: {}", body.status)))?;

    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get(body.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !order.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {} to {next}",
            order.status
        )));
    }

    if !orders.update_status(order.id, order.status, next).await? {
        return Err(AppError::Conflict(
            "Order was updated by another request".to_string(),
        ));
    }

    tracing::info!(from = %order.status, to = %next, "Order status changed");
    Ok(Json(json!({
        "success": true,
        "message": "Order status updated",
        "status": next,
        "statusLabel": next.label(),
    })))
}
