//! Seed the catalog with demo products.
//!
//! The YAML file holds a `products` list. Each entry is a product as the
//! seller form would send it plus the image URLs to attach:
//!
//! ```yaml
//! products:
//!   - name: Potato 500g
//!     category: [Vegetables]
//!     description: [Fresh and organic]
//!     price: 25
//!     offerPrice: 20
//!     stock: 40
//!     images: [/uploads/potato.png]
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use instabasket_storefront::db::{ProductRepository, RepositoryError};
use instabasket_storefront::models::{NewProduct, ProductInput, ProductInputError};

use super::{CommandError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} invalid products")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct ProductSeedFile {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

/// One product entry.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(flatten)]
    pub product: ProductInput,
}

/// Validate every entry, collecting all failures.
fn validate(file: ProductSeedFile) -> Result<Vec<NewProduct>, Vec<(usize, ProductInputError)>> {
    let mut valid = Vec::new();
    let mut errors = Vec::new();

    for (index, entry) in file.products.into_iter().enumerate() {
        match entry.product.validate(entry.images) {
            Ok(product) => valid.push(product),
            Err(e) => errors.push((index, e)),
        }
    }

    if errors.is_empty() { Ok(valid) } else { Err(errors) }
}

/// Insert the products listed in `file_path`.
///
/// The whole file is validated before the database is touched.
///
/// # Errors
///
/// Returns `SeedError` if the file is missing or invalid, or an insert fails.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_string()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let file: ProductSeedFile = serde_yaml::from_str(&content)?;

    let products = validate(file).map_err(|errors| {
        error!("Product validation failed:");
        for (index, err) in &errors {
            error!("  - entry {index}: {err}");
        }
        SeedError::Invalid(errors.len())
    })?;
    info!(count = products.len(), "Products validated");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);
    for product in &products {
        let created = repo.create(product).await?;
        info!(product_id = %created.id, name = %created.name, "Product created");
    }

    info!(count = products.len(), "Seeding complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: &str = r"
products:
  - name: Potato 500g
    category: [Vegetables]
    description: ['Fresh and organic', '']
    price: 25
    offerPrice: 20
    stock: 40
    images: [/uploads/potato.png]
  - name: Milk 1L
    category: [Dairy]
    price: 1.50
    offerPrice: 1.20
    images: [/uploads/milk.png]
";

    #[test]
    fn test_seed_file_parses_and_validates() {
        let file: ProductSeedFile = serde_yaml::from_str(SEED).unwrap();
        let products = validate(file).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].description, vec!["Fresh and organic"]);
        assert_eq!(products[0].stock, 40);
        assert_eq!(products[1].stock, 0);
    }

    #[test]
    fn test_seed_collects_every_invalid_entry() {
        let yaml = r"
products:
  - name: ''
    price: 5
    offerPrice: 4
    images: [/uploads/a.png]
  - name: Bread
    price: 5
    offerPrice: 4
  - name: Eggs
    price: 3
    offerPrice: 2
    images: [/uploads/eggs.png]
";
        let file: ProductSeedFile = serde_yaml::from_str(yaml).unwrap();
        let errors = validate(file).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], (0, ProductInputError::MissingName)));
        assert!(matches!(errors[1], (1, ProductInputError::NoImages)));
    }
}
