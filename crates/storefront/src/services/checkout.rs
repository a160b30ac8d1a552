//! Order placement.
//!
//! Both payment paths share one validation pass: items are merged per
//! product, the address must belong to the caller, and every product must
//! exist, be unexpired and have enough stock. Totals always come from the
//! offer prices currently stored, never from the client.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use instabasket_core::cart::MAX_LINE_QUANTITY;
use instabasket_core::pricing::{order_total, tax_multiplier, to_minor_units};
use instabasket_core::{AddressId, OrderId, OrderStatus, PaymentMethod, ProductId, UserId};

use crate::db::{AddressRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::models::{NewOrder, Order, OrderItem, Product};
use crate::services::stripe::{
    CheckoutLine, CheckoutSessionRequest, StripeClient, StripeError,
};

/// One requested line, as sent by the client.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Body of both checkout endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    pub address_id: AddressId,
}

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Please add at least one item")]
    EmptyOrder,

    #[error("Invalid quantity for product {0}")]
    InvalidQuantity(ProductId),

    #[error("Address not found")]
    AddressNotFound,

    #[error("Product with ID {0} not found")]
    ProductNotFound(ProductId),

    #[error("{0} has expired")]
    ProductExpired(String),

    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("User not found")]
    UserNotFound,

    #[error("amount for {0} cannot be charged")]
    AmountOutOfRange(String),

    #[error("payment provider error: {0}")]
    Stripe(#[from] StripeError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A validated line with the product it refers to.
#[derive(Debug, Clone)]
struct PricedLine {
    item: OrderItem,
    name: String,
}

/// Order placement service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    frontend_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, frontend_url: &'a str) -> Self {
        Self {
            pool,
            stripe,
            frontend_url,
        }
    }

    /// Place a cash-on-delivery order and clear the caller's cart.
    ///
    /// Placement leaves stock unchanged; only paid online orders take stock.
    ///
    /// # Errors
    ///
    /// Returns a validation variant of `CheckoutError` for bad input.
    /// Returns `CheckoutError::Repository` if a query fails.
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn place_cod(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let lines = self.validate(user_id, request).await?;
        let order = self
            .create_order(user_id, request.address_id, &lines, PaymentMethod::Cod)
            .await?;

        UserRepository::new(self.pool).clear_cart(user_id).await?;

        tracing::info!(order_id = %order.id, amount = %order.amount, "COD order placed");
        Ok(order)
    }

    /// Create an online order and open a hosted checkout session for it.
    ///
    /// Returns the URL the shopper should be redirected to. If the session
    /// cannot be opened, the order is deleted again.
    ///
    /// # Errors
    ///
    /// Returns a validation variant of `CheckoutError` for bad input.
    /// Returns `CheckoutError::Stripe` if the payment provider fails.
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn start_online(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<String, CheckoutError> {
        let user = UserRepository::new(self.pool)
            .get_by_id(user_id)
            .await?
            .ok_or(CheckoutError::UserNotFound)?;

        let lines = self.validate(user_id, request).await?;
        let checkout_lines = stripe_lines(&lines)?;
        let order = self
            .create_order(user_id, request.address_id, &lines, PaymentMethod::Online)
            .await?;

        match self
            .open_session(order.id, user_id, user.email.as_str(), &user.name, checkout_lines)
            .await
        {
            Ok(url) => {
                tracing::info!(order_id = %order.id, amount = %order.amount, "Online checkout started");
                Ok(url)
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Checkout session failed, removing order");
                if let Err(cleanup) = OrderRepository::new(self.pool).delete_unpaid(order.id).await {
                    tracing::error!(order_id = %order.id, error = %cleanup, "Failed to remove order");
                }
                Err(e)
            }
        }
    }

    async fn open_session(
        &self,
        order_id: OrderId,
        user_id: UserId,
        email: &str,
        name: &str,
        lines: Vec<CheckoutLine>,
    ) -> Result<String, CheckoutError> {
        let customer = self.stripe.create_customer(email, name).await?;
        let base = self.frontend_url.trim_end_matches('/');

        let session = self
            .stripe
            .create_checkout_session(&CheckoutSessionRequest {
                customer_id: customer.id,
                order_id,
                user_id,
                lines,
                success_url: format!("{base}/my-orders"),
                cancel_url: format!("{base}/cart"),
            })
            .await?;

        OrderRepository::new(self.pool)
            .attach_checkout_session(order_id, &session.id)
            .await?;

        session
            .url
            .ok_or_else(|| CheckoutError::Stripe(StripeError::MissingSessionUrl(session.id)))
    }

    async fn validate(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<Vec<PricedLine>, CheckoutError> {
        let quantities = merge_items(&request.items)?;

        AddressRepository::new(self.pool)
            .get_owned(request.address_id, user_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let ids: Vec<ProductId> = quantities.keys().copied().collect();
        let products: HashMap<ProductId, Product> = ProductRepository::new(self.pool)
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        price_lines(&quantities, &products, Utc::now())
    }

    async fn create_order(
        &self,
        user_id: UserId,
        address_id: AddressId,
        lines: &[PricedLine],
        payment_method: PaymentMethod,
    ) -> Result<Order, CheckoutError> {
        let items: Vec<OrderItem> = lines.iter().map(|l| l.item).collect();
        let amounts: Vec<_> = items.iter().map(OrderItem::amount).collect();

        let status = match payment_method {
            PaymentMethod::Cod => OrderStatus::Placed,
            PaymentMethod::Online => OrderStatus::Initiated,
        };

        let order = OrderRepository::new(self.pool)
            .create(&NewOrder {
                user_id,
                address_id,
                amount: order_total(&amounts),
                items,
                payment_method,
                status,
            })
            .await?;
        Ok(order)
    }
}

/// Merge duplicate products and check quantities.
fn merge_items(items: &[CheckoutItem]) -> Result<BTreeMap<ProductId, u32>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let mut merged: BTreeMap<ProductId, u32> = BTreeMap::new();
    for item in items {
        let quantity = u32::try_from(item.quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or(CheckoutError::InvalidQuantity(item.product_id))?;

        let entry = merged.entry(item.product_id).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(CheckoutError::InvalidQuantity(item.product_id))?;
    }
    Ok(merged)
}

/// Attach current prices to the merged lines, checking availability.
fn price_lines(
    quantities: &BTreeMap<ProductId, u32>,
    products: &HashMap<ProductId, Product>,
    now: DateTime<Utc>,
) -> Result<Vec<PricedLine>, CheckoutError> {
    quantities
        .iter()
        .map(|(&product_id, &quantity)| {
            let product = products
                .get(&product_id)
                .ok_or(CheckoutError::ProductNotFound(product_id))?;

            if product.is_expired_at(now) {
                return Err(CheckoutError::ProductExpired(product.name.clone()));
            }
            if quantity > product.stock {
                return Err(CheckoutError::InsufficientStock(product.name.clone()));
            }

            Ok(PricedLine {
                item: OrderItem {
                    product_id,
                    quantity,
                    unit_price: product.pricing.offer_price(),
                },
                name: product.name.clone(),
            })
        })
        .collect()
}

/// Checkout session lines: unit amount is the taxed offer price in cents.
fn stripe_lines(lines: &[PricedLine]) -> Result<Vec<CheckoutLine>, CheckoutError> {
    lines
        .iter()
        .map(|line| {
            let unit_amount = to_minor_units(line.item.unit_price * tax_multiplier())
                .ok_or_else(|| CheckoutError::AmountOutOfRange(line.name.clone()))?;
            Ok(CheckoutLine {
                name: line.name.clone(),
                unit_amount,
                quantity: line.item.quantity,
            })
        })
        .collect()
}
