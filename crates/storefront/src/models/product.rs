//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use instabasket_core::{PricingError, ProductId, ProductPricing};

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Description bullet points.
    pub description: Vec<String>,
    /// Category tags (e.g. "Vegetables", "Dairy").
    pub category: Vec<String>,
    /// Public image URLs.
    pub images: Vec<String>,
    pub pricing: ProductPricing,
    pub stock: u32,
    /// Perishables carry an expiry date; nothing can be ordered past it.
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether any units are available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whether the product is past its expiry date at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| now > expiry)
    }
}

/// A validated product ready to insert.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Vec<String>,
    pub category: Vec<String>,
    pub images: Vec<String>,
    pub pricing: ProductPricing,
    pub stock: u32,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Errors in seller-supplied product data.
#[derive(Debug, Error)]
pub enum ProductInputError {
    #[error("Product name is required")]
    MissingName,

    #[error("At least one image is required")]
    NoImages,

    #[error("Stock must not exceed {max}", max = i32::MAX)]
    StockOutOfRange,

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Product fields as entered by the seller, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    pub price: Decimal,
    pub offer_price: Decimal,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl ProductInput {
    /// Validate the input and attach image URLs.
    ///
    /// Text fields are trimmed and blank lines dropped.
    ///
    /// # Errors
    ///
    /// Returns `ProductInputError` if the name is blank, no image is given,
    /// the stock does not fit the stock column, or the prices are invalid.
    pub fn validate(self, images: Vec<String>) -> Result<NewProduct, ProductInputError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ProductInputError::MissingName);
        }
        if images.is_empty() {
            return Err(ProductInputError::NoImages);
        }
        if i32::try_from(self.stock).is_err() {
            return Err(ProductInputError::StockOutOfRange);
        }

        Ok(NewProduct {
            name,
            description: clean_lines(self.description),
            category: clean_lines(self.category),
            images,
            pricing: ProductPricing::new(self.price, self.offer_price)?,
            stock: self.stock,
            expiry_date: self.expiry_date,
        })
    }
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Product as returned by the catalog endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: Vec<String>,
    pub category: Vec<String>,
    pub images: Vec<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub offer_price: Decimal,
    pub stock: u32,
    pub in_stock: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    /// Build the API view, evaluating expiry at `now`.
    #[must_use]
    pub fn at(product: Product, now: DateTime<Utc>) -> Self {
        Self {
            in_stock: product.in_stock(),
            is_expired: product.is_expired_at(now),
            id: product.id,
            name: product.name,
            description: product.description,
            category: product.category,
            images: product.images,
            price: product.pricing.price(),
            offer_price: product.pricing.offer_price(),
            stock: product.stock,
            expiry_date: product.expiry_date,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self::at(product, Utc::now())
    }
}

/// The slice of a product shown inside an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub category: Vec<String>,
    pub images: Vec<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub offer_price: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn product(stock: u32, expiry_date: Option<DateTime<Utc>>) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(1),
            name: "Organic Bananas".to_string(),
            description: vec!["Ripe".to_string()],
            category: vec!["Fruits".to_string()],
            images: vec!["/uploads/bananas.png".to_string()],
            pricing: ProductPricing::new(Decimal::from(5), Decimal::from(4)).unwrap(),
            stock,
            expiry_date,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_in_stock() {
        assert!(product(3, None).in_stock());
        assert!(!product(0, None).in_stock());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(!product(1, None).is_expired_at(now));
        assert!(!product(1, Some(now + Duration::days(1))).is_expired_at(now));
        assert!(product(1, Some(now - Duration::days(1))).is_expired_at(now));
    }

    fn input(json: serde_json::Value) -> ProductInput {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_input_validates_and_trims() {
        let new = input(serde_json::json!({
            "name": "  Fresh Milk ",
            "description": ["Full cream", "  ", " 1 litre "],
            "category": ["Dairy"],
            "price": 2.5,
            "offerPrice": 2.0,
            "stock": 12,
        }))
        .validate(vec!["/uploads/milk.png".to_string()])
        .unwrap();

        assert_eq!(new.name, "Fresh Milk");
        assert_eq!(new.description, vec!["Full cream", "1 litre"]);
        assert_eq!(new.stock, 12);
        assert_eq!(new.pricing.offer_price(), Decimal::new(2, 0));
    }

    #[test]
    fn test_input_rejects_bad_products() {
        let base = serde_json::json!({ "name": "Milk", "price": 2, "offerPrice": 3 });
        assert!(matches!(
            input(base).validate(vec!["/uploads/a.png".to_string()]),
            Err(ProductInputError::Pricing(_))
        ));

        let base = serde_json::json!({ "name": " ", "price": 3, "offerPrice": 2 });
        assert!(matches!(
            input(base).validate(vec!["/uploads/a.png".to_string()]),
            Err(ProductInputError::MissingName)
        ));

        let base = serde_json::json!({ "name": "Milk", "price": 3, "offerPrice": 2 });
        assert!(matches!(
            input(base).validate(vec![]),
            Err(ProductInputError::NoImages)
        ));
    }

    #[test]
    fn test_input_rejects_unstorable_values() {
        let base = serde_json::json!({ "name": "Milk", "price": 10.004, "offerPrice": 10.001 });
        assert!(matches!(
            input(base).validate(vec!["/uploads/a.png".to_string()]),
            Err(ProductInputError::Pricing(PricingError::TooPrecise))
        ));

        let base = serde_json::json!({
            "name": "Milk",
            "price": 3,
            "offerPrice": 2,
            "stock": 3_000_000_000_u32,
        });
        assert!(matches!(
            input(base).validate(vec!["/uploads/a.png".to_string()]),
            Err(ProductInputError::StockOutOfRange)
        ));
    }

    #[test]
    fn test_view_serializes_derived_fields() {
        let now = Utc::now();
        let view = ProductView::at(product(0, Some(now - Duration::hours(1))), now);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["offerPrice"], 4.0);
        assert_eq!(json["price"], 5.0);
        assert_eq!(json["inStock"], false);
        assert_eq!(json["isExpired"], true);
    }
}
