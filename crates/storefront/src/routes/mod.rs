//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness
//! GET  /health/ready               - Readiness (database ping)
//!
//! # Shopper accounts (cookie: token)
//! POST /api/user/register/initiate - Email an OTP for a new account
//! POST /api/user/register/verify   - Confirm the OTP, create the user
//! POST /api/user/register/resend   - Fresh OTP for a pending registration
//! POST /api/user/login             - Sign in
//! GET  /api/user/auth              - Current user and stored cart
//! GET  /api/user/logout            - Clear the cookie
//!
//! # Seller (cookie: sellerToken)
//! POST /api/seller/login
//! GET  /api/seller/auth
//! GET  /api/seller/logout
//!
//! # Catalog
//! GET  /api/products/all           - All products, newest first
//! GET  /api/products/{id}          - One product
//! POST /api/products/add           - Multipart product upload (seller)
//! POST /api/products/stock         - Set stock (seller)
//!
//! # Cart, addresses, orders (shopper unless noted)
//! POST /api/cart/update
//! POST /api/address/add
//! GET  /api/address/get
//! POST /api/order/cod
//! POST /api/order/stripe           - Returns a Stripe Checkout URL
//! GET  /api/order/user
//! GET  /api/order/seller           - (seller)
//! POST /api/order/status           - (seller)
//!
//! # Payments
//! POST /stripe                     - Signed Stripe webhook (raw body)
//! ```

pub mod address;
pub mod cart;
pub mod health;
pub mod order;
pub mod products;
pub mod seller;
pub mod user;
pub mod webhook;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the shopper account routes router.
///
/// Registration and login are rate limited per client IP.
pub fn user_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register/initiate", post(user::register_initiate))
        .route("/register/verify", post(user::register_verify))
        .route("/register/resend", post(user::register_resend))
        .route("/login", post(user::login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(limited)
        .route("/auth", get(user::check_auth))
        .route("/logout", get(user::logout))
}

/// Create the seller routes router.
pub fn seller_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(seller::login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(limited)
        .route("/auth", get(seller::check_auth))
        .route("/logout", get(seller::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/all", get(products::list))
        .route("/{id}", get(products::show))
        .route(
            "/add",
            post(products::add).layer(DefaultBodyLimit::max(products::MAX_UPLOAD_BYTES)),
        )
        .route("/stock", post(products::set_stock))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new().route("/update", post(cart::update))
}

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(address::add))
        .route("/get", get(address::list))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/cod", post(order::place_cod))
        .route("/stripe", post(order::place_online))
        .route("/user", get(order::user_orders))
        .route("/seller", get(order::seller_orders))
        .route("/status", post(order::update_status))
}

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/user", user_routes())
        .nest("/seller", seller_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/address", address_routes())
        .nest("/order", order_routes())
}

/// Create all routes for the storefront.
///
/// Everything under `/api` shares a relaxed per-IP rate limit; health checks
/// and the webhook are not limited.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes().layer(api_rate_limiter()))
        .route("/stripe", post(webhook::stripe))
        .fallback(not_found)
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;

    const CLIENT_IP: &str = "203.0.113.7";

    async fn send(mut request: Request<Body>) -> (StatusCode, serde_json::Value) {
        request
            .headers_mut()
            .insert("x-forwarded-for", CLIENT_IP.parse().unwrap());
        let app = routes().with_state(AppState::for_tests());
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = routes().with_state(AppState::for_tests());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (status, body) = send(get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn test_shopper_routes_need_cookie() {
        for request in [
            get("/api/user/auth"),
            get("/api/address/get"),
            get("/api/order/user"),
            post_json("/api/cart/update", &serde_json::json!({ "cartData": {} })),
            post_json(
                "/api/order/cod",
                &serde_json::json!({ "items": [], "addressId": 1 }),
            ),
        ] {
            let (status, body) = send(request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "Not authorized");
        }
    }

    #[tokio::test]
    async fn test_seller_routes_reject_shopper_cookie() {
        let state = AppState::for_tests();
        let token = state
            .tokens()
            .issue_user(instabasket_core::UserId::new(1), "ada@example.com")
            .unwrap();
        let request = Request::builder()
            .uri("/api/order/seller")
            .header("x-forwarded-for", CLIENT_IP)
            .header("cookie", format!("token={token}"))
            .body(Body::empty())
            .unwrap();

        let response = routes().with_state(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let (status, body) = send(
            Request::builder()
                .method("POST")
                .uri("/stripe")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let (status, _) = send(
            Request::builder()
                .method("POST")
                .uri("/stripe")
                .header("stripe-signature", "t=1,v1=deadbeef")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
