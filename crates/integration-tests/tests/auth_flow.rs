//! Integration tests for shopper registration, login and the seller session.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`ib-cli migrate`)
//! - The storefront running (`cargo run -p instabasket-storefront`)
//! - An SMTP server the storefront can deliver OTP mail to
//!
//! Run with: `cargo test -p instabasket-integration-tests -- --ignored`

use instabasket_integration_tests::{TEST_OTP, TEST_PASSWORD, TestContext, unique_email};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();

    let resp = client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client.get(ctx.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_register_then_session_round_trip() {
    let ctx = TestContext::new().await;
    let (client, email) = ctx.register_shopper().await;

    let resp = client.get(ctx.url("/api/user/auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], email.as_str());
    assert_eq!(body["user"]["cartItems"], json!({}));
    assert!(body["user"].get("password").is_none());

    let resp = client.get(ctx.url("/api/user/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(ctx.url("/api/user/auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(ctx.url("/api/user/login"))
        .json(&json!({ "email": email.to_uppercase(), "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(ctx.url("/api/user/auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_register_existing_email_conflicts() {
    let ctx = TestContext::new().await;
    let (_, email) = ctx.register_shopper().await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/register/initiate"))
        .json(&json!({ "name": "Again", "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_wrong_otp_is_rejected() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();
    let email = unique_email("otp");

    let resp = client
        .post(ctx.url("/api/user/register/initiate"))
        .json(&json!({ "name": "Otp Tester", "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    ctx.plant_otp(&email).await;

    let resp = client
        .post(ctx.url("/api/user/register/verify"))
        .json(&json!({ "email": email, "otp": "000000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid OTP");

    let resp = client.get(ctx.url("/api/user/auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_expired_otp_is_rejected_and_discarded() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();
    let email = unique_email("expired");

    let resp = client
        .post(ctx.url("/api/user/register/initiate"))
        .json(&json!({ "name": "Late Shopper", "email": email, "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    ctx.plant_otp(&email).await;

    sqlx::query(
        "UPDATE storefront.pending_user SET otp_expires_at = now() - interval '1 minute' \
         WHERE email = $1",
    )
    .bind(&email)
    .execute(&ctx.pool)
    .await
    .unwrap();

    let resp = client
        .post(ctx.url("/api/user/register/verify"))
        .json(&json!({ "email": email, "otp": TEST_OTP }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "OTP has expired, please register again");

    let pending: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM storefront.pending_user WHERE email = $1")
            .bind(&email)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(pending, 0);

    // Nothing left to verify against
    let resp = client
        .post(ctx.url("/api/user/register/verify"))
        .json(&json!({ "email": email, "otp": TEST_OTP }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "No pending registration found for this email");
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_resend_without_pending_registration() {
    let ctx = TestContext::new().await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/register/resend"))
        .json(&json!({ "email": unique_email("nobody") }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_login_with_wrong_password() {
    let ctx = TestContext::new().await;
    let (_, email) = ctx.register_shopper().await;

    let resp = TestContext::client()
        .post(ctx.url("/api/user/login"))
        .json(&json!({ "email": email, "password": "not-the-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_seller_session() {
    let ctx = TestContext::new().await;
    let seller = ctx.seller().await;

    let resp = seller.get(ctx.url("/api/seller/auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = seller.get(ctx.url("/api/seller/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = seller.get(ctx.url("/api/seller/auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
