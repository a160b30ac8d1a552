//! Integration tests for the InstaBasket storefront API.
//!
//! # Running Tests
//!
//! The tests talk to a running storefront and its database, so they are
//! `#[ignore]`d by default:
//!
//! ```bash
//! # Migrate and start the server (SMTP pointed at a local mail catcher)
//! cargo run -p instabasket-cli -- migrate
//! cargo run -p instabasket-storefront
//!
//! # Run integration tests
//! cargo test -p instabasket-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Server under test (default: `http://localhost:3000`)
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - Same database as the server
//! - `SELLER_EMAIL` / `SELLER_PASSWORD` - Seller credentials the server uses
//! - `STRIPE_WEBHOOK_SECRET` - Webhook secret the server uses

#![allow(clippy::missing_panics_doc)]

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use instabasket_storefront::db::{self, ProductRepository};
use instabasket_storefront::models::ProductInput;
use instabasket_storefront::services::email::otp_digest;

/// Password used for every shopper the tests register.
pub const TEST_PASSWORD: &str = "Gr0cery-Run-2026";

/// OTP the tests plant in place of the emailed one.
pub const TEST_OTP: &str = "424242";

/// Shared handles for one test.
pub struct TestContext {
    pub base_url: String,
    pub pool: PgPool,
}

impl TestContext {
    /// Connect to the database the server under test uses.
    pub async fn new() -> Self {
        let base_url = std::env::var("STOREFRONT_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let database_url = std::env::var("STOREFRONT_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("STOREFRONT_DATABASE_URL must be set");
        let pool = db::create_pool(&SecretString::from(database_url))
            .await
            .expect("Failed to connect to storefront database");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            pool,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A fresh client with its own cookie jar.
    #[must_use]
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Register a new shopper and return a signed-in client plus the email.
    ///
    /// The emailed OTP is unknown here, so its stored digest is replaced with
    /// the digest of [`TEST_OTP`] before verifying.
    pub async fn register_shopper(&self) -> (Client, String) {
        let client = Self::client();
        let email = unique_email("shopper");

        let resp = client
            .post(self.url("/api/user/register/initiate"))
            .json(&json!({ "name": "Test Shopper", "email": email, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("initiate request failed");
        assert_eq!(resp.status(), StatusCode::OK);

        self.plant_otp(&email).await;

        let resp = client
            .post(self.url("/api/user/register/verify"))
            .json(&json!({ "email": email, "otp": TEST_OTP }))
            .send()
            .await
            .expect("verify request failed");
        assert_eq!(resp.status(), StatusCode::CREATED);

        (client, email)
    }

    /// Overwrite the pending registration's OTP digest with [`TEST_OTP`]'s.
    pub async fn plant_otp(&self, email: &str) {
        let rows = sqlx::query("UPDATE storefront.pending_user SET otp_digest = $1 WHERE email = $2")
            .bind(otp_digest(TEST_OTP))
            .bind(email)
            .execute(&self.pool)
            .await
            .expect("Failed to plant OTP")
            .rows_affected();
        assert_eq!(rows, 1, "no pending registration for {email}");
    }

    /// A client signed in as the seller.
    pub async fn seller(&self) -> Client {
        let client = Self::client();
        let resp = client
            .post(self.url("/api/seller/login"))
            .json(&json!({
                "email": std::env::var("SELLER_EMAIL").expect("SELLER_EMAIL must be set"),
                "password": std::env::var("SELLER_PASSWORD").expect("SELLER_PASSWORD must be set"),
            }))
            .send()
            .await
            .expect("seller login failed");
        assert_eq!(resp.status(), StatusCode::OK);
        client
    }

    /// Insert a product straight into the catalog and return its id.
    pub async fn create_product(&self, price: i64, offer_price: i64, stock: u32) -> i32 {
        let input = ProductInput {
            name: format!("Test product {}", Uuid::new_v4().simple()),
            description: vec!["Integration test item".to_string()],
            category: vec!["Vegetables".to_string()],
            price: Decimal::from(price),
            offer_price: Decimal::from(offer_price),
            stock,
            expiry_date: None,
        };
        let product = input
            .validate(vec!["/uploads/test.png".to_string()])
            .expect("valid product");
        let created = ProductRepository::new(&self.pool)
            .create(&product)
            .await
            .expect("Failed to create product");
        i32::from(created.id)
    }

    /// Current stock of a product.
    pub async fn stock_of(&self, product_id: i32) -> i32 {
        sqlx::query_scalar("SELECT stock FROM storefront.product WHERE id = $1")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to read stock")
    }

    /// Add an address for the signed-in shopper and return its id.
    pub async fn add_address(&self, client: &Client, email: &str) -> i64 {
        let resp = client
            .post(self.url("/api/address/add"))
            .json(&json!({
                "address": {
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "email": email,
                    "phone": "+1 555 0100",
                    "street": "12 Market Street",
                    "city": "Springfield",
                    "state": "IL",
                    "zipCode": "62701",
                    "country": "US",
                }
            }))
            .send()
            .await
            .expect("address request failed");
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.expect("address body");
        body["address"]["id"].as_i64().expect("address id")
    }

    /// Deliver a signed webhook event to the server.
    pub async fn send_webhook(&self, event: &Value) -> reqwest::Response {
        let secret =
            std::env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET must be set");
        let payload = event.to_string();
        Self::client()
            .post(self.url("/stripe"))
            .header("stripe-signature", stripe_signature(&secret, &payload, Utc::now().timestamp()))
            .header("content-type", "application/json")
            .body(payload)
            .send()
            .await
            .expect("webhook request failed")
    }
}

/// An email address no other test run uses.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// `Stripe-Signature` header value for `payload` signed at `timestamp`.
#[must_use]
pub fn stripe_signature(secret: &str, payload: &str, timestamp: i64) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
