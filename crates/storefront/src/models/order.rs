//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use instabasket_core::{
    AddressId, LineAmount, OrderId, OrderStatus, PaymentMethod, ProductId, UserId,
};

use super::{Address, ProductSummary};

/// One line of an order, with the unit price captured at order time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    /// The priced line used for total computation.
    #[must_use]
    pub const fn amount(&self) -> LineAmount {
        LineAmount::new(self.unit_price, self.quantity)
    }
}

/// A stored order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub items: Vec<OrderItem>,
    /// Total including tax, in whole currency units.
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub status: OrderStatus,
    /// Stripe checkout session (online orders only).
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order ready to insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub items: Vec<OrderItem>,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
}

/// An order line with its product populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product: ProductSummary,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// Order as returned by the order listing endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub address: Address,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
