//! Integration tests for the Stripe webhook.
//!
//! Events are signed locally with `STRIPE_WEBHOOK_SECRET`; no Stripe account
//! is needed.
//!
//! Run with: `cargo test -p instabasket-integration-tests -- --ignored`

use instabasket_core::{AddressId, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};
use instabasket_integration_tests::TestContext;
use instabasket_storefront::db::OrderRepository;
use instabasket_storefront::models::{NewOrder, OrderItem};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use uuid::Uuid;

fn event_id() -> String {
    format!("evt_{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_unsigned_delivery_is_rejected() {
    let ctx = TestContext::new().await;

    let resp = TestContext::client()
        .post(ctx.url("/stripe"))
        .header("stripe-signature", "t=1,v1=00")
        .body(r#"{"id":"evt_forged","type":"checkout.session.completed"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_redelivery_is_acknowledged_once() {
    let ctx = TestContext::new().await;
    let event = json!({
        "id": event_id(),
        "type": "customer.created",
        "data": { "object": { "id": "cus_123" } },
    });

    let body: Value = ctx.send_webhook(&event).await.json().await.unwrap();
    assert_eq!(body, json!({ "received": true }));

    let body: Value = ctx.send_webhook(&event).await.json().await.unwrap();
    assert_eq!(body, json!({ "received": true, "duplicate": true }));
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_completed_session_pays_order_and_takes_stock() {
    let ctx = TestContext::new().await;
    let (client, email) = ctx.register_shopper().await;
    let product = ctx.create_product(10, 8, 5).await;
    let address = ctx.add_address(&client, &email).await;

    let me: Value = client
        .get(ctx.url("/api/user/auth"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_id = i32::try_from(me["user"]["id"].as_i64().unwrap()).unwrap();

    let order = OrderRepository::new(&ctx.pool)
        .create(&NewOrder {
            user_id: UserId::new(user_id),
            address_id: AddressId::new(i32::try_from(address).unwrap()),
            items: vec![OrderItem {
                product_id: ProductId::new(product),
                quantity: 2,
                unit_price: Decimal::from(8),
            }],
            amount: Decimal::from(16),
            payment_method: PaymentMethod::Online,
            status: OrderStatus::Initiated,
        })
        .await
        .unwrap();

    // Unpaid online orders are hidden from the shopper
    let body: Value = client
        .get(ctx.url("/api/order/user"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["orders"].as_array().unwrap().is_empty());

    let event = json!({
        "id": event_id(),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "object": "checkout.session",
            "payment_intent": "pi_test_1",
            "metadata": { "orderId": order.id.to_string(), "userId": user_id.to_string() },
        }},
    });

    let resp = ctx.send_webhook(&event).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(ctx.stock_of(product).await, 3);

    let body: Value = client
        .get(ctx.url("/api/order/user"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["isPaid"], true);
    assert_eq!(orders[0]["status"], "placed");

    // Replaying the same event changes nothing
    let body: Value = ctx.send_webhook(&event).await.json().await.unwrap();
    assert_eq!(body["duplicate"], true);
    assert_eq!(ctx.stock_of(product).await, 3);
}

/// Register a shopper and give them an unpaid online order for one unit.
async fn unpaid_online_order(ctx: &TestContext) -> (OrderId, i32, i32) {
    let (client, email) = ctx.register_shopper().await;
    let product = ctx.create_product(10, 8, 5).await;
    let address = ctx.add_address(&client, &email).await;

    let me: Value = client
        .get(ctx.url("/api/user/auth"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_id = i32::try_from(me["user"]["id"].as_i64().unwrap()).unwrap();

    let order = OrderRepository::new(&ctx.pool)
        .create(&NewOrder {
            user_id: UserId::new(user_id),
            address_id: AddressId::new(i32::try_from(address).unwrap()),
            items: vec![OrderItem {
                product_id: ProductId::new(product),
                quantity: 1,
                unit_price: Decimal::from(8),
            }],
            amount: Decimal::from(8),
            payment_method: PaymentMethod::Online,
            status: OrderStatus::Initiated,
        })
        .await
        .unwrap();

    (order.id, product, user_id)
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_expired_session_discards_unpaid_order() {
    let ctx = TestContext::new().await;
    let (order_id, product, user_id) = unpaid_online_order(&ctx).await;

    let event = json!({
        "id": event_id(),
        "type": "checkout.session.expired",
        "data": { "object": {
            "id": "cs_test_2",
            "object": "checkout.session",
            "metadata": { "orderId": order_id.to_string(), "userId": user_id.to_string() },
        }},
    });
    let resp = ctx.send_webhook(&event).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let repo = OrderRepository::new(&ctx.pool);
    assert!(repo.get(order_id).await.unwrap().is_none());
    assert_eq!(ctx.stock_of(product).await, 5);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_failed_payment_discards_unpaid_order() {
    let ctx = TestContext::new().await;
    let (order_id, product, user_id) = unpaid_online_order(&ctx).await;

    let event = json!({
        "id": event_id(),
        "type": "payment_intent.payment_failed",
        "data": { "object": {
            "id": "pi_test_failed",
            "object": "payment_intent",
            "metadata": { "orderId": order_id.to_string(), "userId": user_id.to_string() },
        }},
    });
    let resp = ctx.send_webhook(&event).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let repo = OrderRepository::new(&ctx.pool);
    assert!(repo.get(order_id).await.unwrap().is_none());
    assert_eq!(ctx.stock_of(product).await, 5);
}
