//! Integration tests for cart sync, cash-on-delivery orders and seller
//! status changes.
//!
//! Run with: `cargo test -p instabasket-integration-tests -- --ignored`

use instabasket_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_cart_is_persisted() {
    let ctx = TestContext::new().await;
    let (client, _) = ctx.register_shopper().await;
    let product = ctx.create_product(10, 8, 5).await;

    let resp = client
        .post(ctx.url("/api/cart/update"))
        .json(&json!({ "cartData": { product.to_string(): 3 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = client
        .get(ctx.url("/api/user/auth"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["user"]["cartItems"][product.to_string()], 3);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_cod_order_flow() {
    let ctx = TestContext::new().await;
    let (client, email) = ctx.register_shopper().await;
    let product = ctx.create_product(100, 50, 10).await;
    let address = ctx.add_address(&client, &email).await;

    client
        .post(ctx.url("/api/cart/update"))
        .json(&json!({ "cartData": { product.to_string(): 3 } }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(ctx.url("/api/order/cod"))
        .json(&json!({
            "items": [{ "productId": product, "quantity": 3 }],
            "addressId": address,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    let order_id = body["orderId"].as_i64().unwrap();

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
    let order = &orders[0];
    assert_eq!(order["id"].as_i64(), Some(order_id));
    assert_eq!(order["paymentMethod"], "COD");
    assert_eq!(order["isPaid"], false);
    assert_eq!(order["status"], "placed");
    // 3 × 50 plus 2% tax
    assert_eq!(order["amount"].as_f64(), Some(153.0));
    assert_eq!(order["items"][0]["product"]["id"].as_i64(), Some(i64::from(product)));
    assert_eq!(order["address"]["id"].as_i64(), Some(address));

    // Cart emptied, stock untouched
    let body: Value = client
        .get(ctx.url("/api/user/auth"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["user"]["cartItems"], json!({}));
    assert_eq!(ctx.stock_of(product).await, 10);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_cod_order_rejects_insufficient_stock() {
    let ctx = TestContext::new().await;
    let (client, email) = ctx.register_shopper().await;
    let product = ctx.create_product(10, 8, 2).await;
    let address = ctx.add_address(&client, &email).await;

    let resp = client
        .post(ctx.url("/api/order/cod"))
        .json(&json!({
            "items": [{ "productId": product, "quantity": 5 }],
            "addressId": address,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Insufficient stock for")
    );
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_cod_order_rejects_unknown_product() {
    let ctx = TestContext::new().await;
    let (client, email) = ctx.register_shopper().await;
    let address = ctx.add_address(&client, &email).await;

    let resp = client
        .post(ctx.url("/api/order/cod"))
        .json(&json!({
            "items": [{ "productId": i32::MAX, "quantity": 1 }],
            "addressId": address,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], format!("Product with ID {} not found", i32::MAX));
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_cod_order_rejects_foreign_address() {
    let ctx = TestContext::new().await;
    let (owner, owner_email) = ctx.register_shopper().await;
    let (other, _) = ctx.register_shopper().await;
    let product = ctx.create_product(10, 8, 5).await;
    let address = ctx.add_address(&owner, &owner_email).await;

    let resp = other
        .post(ctx.url("/api/order/cod"))
        .json(&json!({
            "items": [{ "productId": product, "quantity": 1 }],
            "addressId": address,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_seller_moves_order_through_statuses() {
    let ctx = TestContext::new().await;
    let (client, email) = ctx.register_shopper().await;
    let product = ctx.create_product(10, 8, 5).await;
    let address = ctx.add_address(&client, &email).await;
    let seller = ctx.seller().await;

    let body: Value = client
        .post(ctx.url("/api/order/cod"))
        .json(&json!({
            "items": [{ "productId": product, "quantity": 1 }],
            "addressId": address,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let order_id = body["orderId"].as_i64().unwrap();

    let body: Value = seller
        .get(ctx.url("/api/order/seller"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        body["orders"]
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["id"].as_i64() == Some(order_id))
    );

    let resp = seller
        .post(ctx.url("/api/order/status"))
        .json(&json!({ "orderId": order_id, "status": "shipped" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["statusLabel"], "Shipped");

    let resp = seller
        .post(ctx.url("/api/order/status"))
        .json(&json!({ "orderId": order_id, "status": "placed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Shoppers cannot change statuses
    let resp = client
        .post(ctx.url("/api/order/status"))
        .json(&json!({ "orderId": order_id, "status": "delivered" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires running storefront and database"]
async fn test_seller_sets_stock() {
    let ctx = TestContext::new().await;
    let seller = ctx.seller().await;
    let product = ctx.create_product(10, 8, 5).await;

    let resp = seller
        .post(ctx.url("/api/products/stock"))
        .json(&json!({ "id": product, "stock": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(ctx.stock_of(product).await, 42);

    let resp = seller
        .post(ctx.url("/api/products/stock"))
        .json(&json!({ "id": product, "stock": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = TestContext::client()
        .get(ctx.url(&format!("/api/products/{product}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["product"]["stock"], 42);
}
