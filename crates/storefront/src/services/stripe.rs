//! Stripe REST API client.
//!
//! Covers the three calls checkout needs (create customer, create hosted
//! checkout session, find a session by payment intent) plus webhook
//! signature verification. Requests are form-encoded as the Stripe API
//! expects; nested parameters use Stripe's bracket syntax.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use instabasket_core::{OrderId, UserId};

use crate::config::StripeConfig;
use crate::services::auth::constant_time_compare;

/// Stripe API version pinned for every request.
const API_VERSION: &str = "2024-06-20";

/// Maximum age of a webhook signature timestamp, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Metadata key carrying our order id.
pub const METADATA_ORDER_ID: &str = "orderId";

/// Metadata key carrying our user id.
pub const METADATA_USER_ID: &str = "userId";

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Webhook signature missing, malformed, stale, or wrong.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Session was created without a redirect URL.
    #[error("checkout session {0} has no URL")]
    MissingSessionUrl(String),
}

/// A Stripe customer.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

/// A hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// The order id stored in the session metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        metadata_order_id(&self.metadata)
    }

    /// The user id stored in the session metadata.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.metadata.get(METADATA_USER_ID)?.parse().ok()
    }
}

/// The object of a `payment_intent.*` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The order id stored in the payment intent metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        metadata_order_id(&self.metadata)
    }
}

fn metadata_order_id(metadata: &HashMap<String, String>) -> Option<OrderId> {
    metadata.get(METADATA_ORDER_ID)?.parse().ok()
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// The `data` member of an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// Deserialize the event object into a concrete Stripe type.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Parse` if the object has a different shape.
    pub fn object<T: for<'de> Deserialize<'de>>(&self) -> Result<T, StripeError> {
        T::deserialize(&self.data.object).map_err(|e| StripeError::Parse(e.to_string()))
    }
}

/// One product line of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    /// Unit amount in minor units (cents), tax included.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Everything needed to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub customer_id: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    currency: String,
    webhook_secret: SecretString,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.secret_key.expose_secret()))
                .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert("Stripe-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            currency: config.currency.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    /// Create a customer.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[tracing::instrument(skip(self))]
    pub async fn create_customer(&self, email: &str, name: &str) -> Result<Customer, StripeError> {
        let form = [("email", email), ("name", name)];
        self.post_form("/v1/customers", &form).await
    }

    /// Create a hosted checkout session for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or the session has no URL.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let form = checkout_session_form(request, &self.currency);
        let session: CheckoutSession = self.post_form("/v1/checkout/sessions", &form).await?;

        if session.url.is_none() {
            return Err(StripeError::MissingSessionUrl(session.id));
        }
        Ok(session)
    }

    /// Find the checkout session that created a payment intent.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[tracing::instrument(skip(self))]
    pub async fn find_session_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<CheckoutSession>, StripeError> {
        let mut url = url::Url::parse(&format!("{}/v1/checkout/sessions", self.api_base))
            .map_err(|e| StripeError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("payment_intent", payment_intent_id)
            .append_pair("limit", "1");

        let response = self.client.get(url).send().await?;
        let list: ListResponse<CheckoutSession> = Self::parse(response).await?;
        Ok(list.data.into_iter().next())
    }

    /// Verify a webhook delivery and parse its event.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidSignature` if verification fails and
    /// `StripeError::Parse` if the verified payload is not an event.
    pub fn construct_event(&self, signature_header: &str, payload: &[u8]) -> Result<Event, StripeError> {
        verify_webhook_signature(
            signature_header,
            payload,
            self.webhook_secret.expose_secret(),
            chrono::Utc::now().timestamp(),
        )?;
        serde_json::from_slice(payload).map_err(|e| StripeError::Parse(e.to_string()))
    }

    async fn post_form<T, F>(&self, path: &str, form: &F) -> Result<T, StripeError>
    where
        T: for<'de> Deserialize<'de>,
        F: serde::Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.api_base);
        let response = self.client.post(&url).form(form).send().await?;
        Self::parse(response).await
    }

    async fn parse<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Flatten a checkout session request into Stripe's form parameters.
fn checkout_session_form(request: &CheckoutSessionRequest, currency: &str) -> Vec<(String, String)> {
    let order_id = request.order_id.to_string();
    let user_id = request.user_id.to_string();

    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("customer".to_string(), request.customer_id.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), order_id.clone()),
        (format!("metadata[{METADATA_ORDER_ID}]"), order_id.clone()),
        (format!("metadata[{METADATA_USER_ID}]"), user_id.clone()),
        (
            format!("payment_intent_data[metadata][{METADATA_ORDER_ID}]"),
            order_id,
        ),
        (
            format!("payment_intent_data[metadata][{METADATA_USER_ID}]"),
            user_id,
        ),
    ];

    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            line.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }

    form
}

/// Check a `Stripe-Signature` header against the raw payload.
///
/// The header holds `t=<unix seconds>` and one or more `v1=<hex>` entries.
/// The expected signature is HMAC-SHA256 over `"{t}.{payload}"`.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` if the header is malformed, the
/// timestamp is outside [`WEBHOOK_TOLERANCE_SECS`] of `now`, or no `v1`
/// entry matches.
pub fn verify_webhook_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("Missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature(
            "No v1 signature".to_string(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature("Invalid timestamp".to_string()))?;
    let within_tolerance = now
        .checked_sub(ts)
        .is_some_and(|skew| skew.unsigned_abs() <= WEBHOOK_TOLERANCE_SECS.unsigned_abs());
    if !within_tolerance {
        return Err(StripeError::InvalidSignature(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature(
            "Signature mismatch".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_signing_key";

    fn sign(timestamp: i64, payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("valid key length");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_signature_valid() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = sign(1_700_000_000, payload);
        assert!(verify_webhook_signature(&header, payload, SECRET, 1_700_000_010).is_ok());
    }

    #[test]
    fn test_signature_accepts_any_matching_v1() {
        let payload = b"{}";
        let valid = sign(1_700_000_000, payload);
        let header = format!("{valid},v1=deadbeef,v0=ignored");
        assert!(verify_webhook_signature(&header, payload, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_signature_tampered_body() {
        let header = sign(1_700_000_000, b"original");
        let result = verify_webhook_signature(&header, b"tampered", SECRET, 1_700_000_000);
        assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
    }

    #[test]
    fn test_signature_extreme_timestamps_rejected() {
        for header in [
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            let result = verify_webhook_signature(header, b"{}", SECRET, 1_700_000_000);
            assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
        }
    }

    #[test]
    fn test_signature_stale_timestamp() {
        let payload = b"{}";
        let header = sign(1_700_000_000, payload);
        let result = verify_webhook_signature(&header, payload, SECRET, 1_700_000_000 + 301);
        assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
    }

    #[test]
    fn test_signature_malformed_header() {
        for header in ["", "v1=abc", "t=abc,v1=abc", "t=1700000000"] {
            let result = verify_webhook_signature(header, b"{}", SECRET, 1_700_000_000);
            assert!(
                matches!(result, Err(StripeError::InvalidSignature(_))),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_signature_wrong_secret() {
        let payload = b"{}";
        let header = sign(1_700_000_000, payload);
        let result = verify_webhook_signature(&header, payload, "whsec_other", 1_700_000_000);
        assert!(result.is_err());
    }

    #[test]
    fn test_checkout_form_carries_metadata_and_lines() {
        let request = CheckoutSessionRequest {
            customer_id: "cus_123".to_string(),
            order_id: OrderId::new(42),
            user_id: UserId::new(7),
            lines: vec![
                CheckoutLine {
                    name: "Organic Bananas".to_string(),
                    unit_amount: 408,
                    quantity: 2,
                },
                CheckoutLine {
                    name: "Whole Milk".to_string(),
                    unit_amount: 153,
                    quantity: 1,
                },
            ],
            success_url: "http://localhost:5173/my-orders".to_string(),
            cancel_url: "http://localhost:5173/cart".to_string(),
        };

        let form: HashMap<String, String> = checkout_session_form(&request, "usd").into_iter().collect();

        assert_eq!(form["mode"], "payment");
        assert_eq!(form["customer"], "cus_123");
        assert_eq!(form["metadata[orderId]"], "42");
        assert_eq!(form["metadata[userId]"], "7");
        assert_eq!(form["payment_intent_data[metadata][orderId]"], "42");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "408");
        assert_eq!(form["line_items[0][quantity]"], "2");
        assert_eq!(form["line_items[1][price_data][product_data][name]"], "Whole Milk");
        assert_eq!(form["line_items[1][price_data][currency]"], "usd");
    }

    #[test]
    fn test_event_object_and_metadata() {
        let event: Event = serde_json::from_str(
            r#"{
                "id": "evt_1",
                "type": "checkout.session.completed",
                "data": { "object": {
                    "id": "cs_test_1",
                    "url": null,
                    "payment_intent": "pi_1",
                    "metadata": { "orderId": "42", "userId": "7" }
                } }
            }"#,
        )
        .unwrap();

        let session: CheckoutSession = event.object().unwrap();
        assert_eq!(session.order_id(), Some(OrderId::new(42)));
        assert_eq!(session.user_id(), Some(UserId::new(7)));
        assert_eq!(session.payment_intent.as_deref(), Some("pi_1"));

        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_2",
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(intent.order_id(), None);
    }

    #[test]
    fn test_client_builds() {
        let config = crate::config::StorefrontConfig::for_tests();
        assert!(StripeClient::new(&config.stripe).is_ok());
    }
}
