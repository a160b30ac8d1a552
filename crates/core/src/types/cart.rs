//! Shopping cart contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Upper bound on the quantity of a single product in one cart.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Errors raised when building a [`Cart`] from client input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// A quantity below zero was submitted.
    #[error("quantity for product {0} cannot be negative")]
    NegativeQuantity(ProductId),
    /// A quantity above [`MAX_LINE_QUANTITY`] was submitted.
    #[error("quantity for product {0} exceeds the limit of {MAX_LINE_QUANTITY}")]
    QuantityTooLarge(ProductId),
}

/// A sparse map of product to quantity.
///
/// Products with quantity zero are never stored, so an empty cart is an
/// empty map. Serializes as a JSON object keyed by product id:
///
/// ```
/// use instabasket_core::{Cart, ProductId};
/// use std::collections::BTreeMap;
///
/// let raw = BTreeMap::from([(ProductId::new(1), 2), (ProductId::new(2), 0)]);
/// let cart = Cart::from_quantities(raw).unwrap();
///
/// assert_eq!(cart.quantity(ProductId::new(1)), 2);
/// assert_eq!(cart.len(), 1);
/// assert_eq!(serde_json::to_string(&cart).unwrap(), r#"{"1":2}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart(BTreeMap<ProductId, u32>);

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a cart from client-submitted quantities, dropping zero entries.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] for a negative quantity or one above
    /// [`MAX_LINE_QUANTITY`].
    pub fn from_quantities(
        quantities: impl IntoIterator<Item = (ProductId, i64)>,
    ) -> Result<Self, CartError> {
        let mut items = BTreeMap::new();
        for (product_id, quantity) in quantities {
            if quantity < 0 {
                return Err(CartError::NegativeQuantity(product_id));
            }
            let quantity = u32::try_from(quantity)
                .ok()
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or(CartError::QuantityTooLarge(product_id))?;
            if quantity > 0 {
                items.insert(product_id, quantity);
            }
        }
        Ok(Self(items))
    }

    /// Quantity of a product, zero if absent.
    #[must_use]
    pub fn quantity(&self, product_id: ProductId) -> u32 {
        self.0.get(&product_id).copied().unwrap_or(0)
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the cart holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(product, quantity)` pairs in product order.
    pub fn iter(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.0.iter().map(|(id, q)| (*id, *q))
    }
}
