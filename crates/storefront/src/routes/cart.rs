//! Cart route handlers.
//!
//! The SPA owns the cart and mirrors it here after every change; the stored
//! copy is handed back by `GET /api/user/auth`.

use std::collections::BTreeMap;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use instabasket_core::{Cart, ProductId};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Cart sync body: `{"cartData": {"<productId>": <quantity>}}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    #[serde(default)]
    pub cart_data: BTreeMap<ProductId, serde_json::Value>,
}

/// POST /api/cart/update
#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Json(body): Json<UpdateCartRequest>,
) -> Result<impl IntoResponse> {
    let cart = parse_cart(body.cart_data)?;

    let stored = UserRepository::new(state.pool())
        .update_cart(claims.id, &cart)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("User not found".to_string()),
            other => other.into(),
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Cart updated successfully",
        "cartItems": stored,
    })))
}

/// Turn raw JSON quantities into a cart, rejecting anything non-integral.
///
/// Whole floats such as `2.0` count as integers.
fn parse_cart(raw: BTreeMap<ProductId, serde_json::Value>) -> Result<Cart> {
    let quantities = raw
        .into_iter()
        .map(|(product_id, value)| {
            whole_number(&value).map(|q| (product_id, q)).ok_or_else(|| {
                AppError::BadRequest(format!("Invalid quantity for product {product_id}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Cart::from_quantities(quantities)?)
}

fn whole_number(value: &serde_json::Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .and_then(Decimal::from_f64)
            .filter(|d| d.fract().is_zero())
            .and_then(|d| d.to_i64())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(json: serde_json::Value) -> BTreeMap<ProductId, serde_json::Value> {
        serde_json::from_value::<UpdateCartRequest>(json!({ "cartData": json }))
            .unwrap()
            .cart_data
    }

    #[test]
    fn test_parse_cart_drops_zero_quantities() {
        let cart = parse_cart(raw(json!({ "1": 2, "2": 0, "3": 1 }))).unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.quantity(ProductId::new(1)), 2);
        assert_eq!(cart.quantity(ProductId::new(2)), 0);
    }

    #[test]
    fn test_parse_cart_accepts_whole_floats() {
        let cart = parse_cart(raw(json!({ "4": 2.0, "5": 3 }))).unwrap();
        assert_eq!(cart.quantity(ProductId::new(4)), 2);
        assert_eq!(cart.quantity(ProductId::new(5)), 3);

        let err = parse_cart(raw(json!({ "4": -2.0 }))).unwrap_err();
        assert!(matches!(err, AppError::Cart(_)));
    }

    #[test]
    fn test_parse_cart_rejects_negative() {
        let err = parse_cart(raw(json!({ "1": -1 }))).unwrap_err();
        assert!(matches!(err, AppError::Cart(_)));
    }

    #[test]
    fn test_parse_cart_rejects_non_numeric() {
        for value in [json!("two"), json!(1.5), json!(null)] {
            let err = parse_cart(raw(json!({ "1": value }))).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
    }

    #[test]
    fn test_missing_cart_data_is_empty_cart() {
        let body: UpdateCartRequest = serde_json::from_value(json!({})).unwrap();
        assert!(parse_cart(body.cart_data).unwrap().is_empty());
    }
}
