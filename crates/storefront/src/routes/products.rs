//! Product catalog route handlers.
//!
//! Listing and detail are public. Adding products and setting stock need the
//! seller cookie; uploaded images land in the upload directory and are
//! served back under `/uploads`.

use std::path::Path;

use axum::{
    Json,
    extract::{Multipart, Path as UrlPath, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use instabasket_core::ProductId;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireSeller;
use crate::models::{ProductInput, ProductView};
use crate::state::AppState;

/// URL prefix uploaded images are served under.
pub const UPLOADS_PATH: &str = "/uploads";

/// Largest accepted multipart body for a product.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

/// Stock update body.
#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub id: ProductId,
    pub stock: i64,
}

/// GET /api/products/all
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let now = Utc::now();
    let products: Vec<ProductView> = ProductRepository::new(state.pool())
        .list_all()
        .await?
        .into_iter()
        .map(|p| ProductView::at(p, now))
        .collect();

    Ok(Json(json!({ "success": true, "products": products })))
}

/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<ProductId>,
) -> Result<impl IntoResponse> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "product": ProductView::from(product),
    })))
}

/// POST /api/products/add
///
/// Multipart fields: `productData` (JSON) and one or more `images` files.
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut input: Option<ProductInput> = None;
    let mut uploads: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        match field.name() {
            Some("productData") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
                input = Some(serde_json::from_str(&text).map_err(|e| {
                    AppError::BadRequest(format!("Invalid product data: {e}"))
                })?);
            }
            Some("images") => {
                let extension = field
                    .file_name()
                    .and_then(image_extension)
                    .ok_or_else(|| AppError::BadRequest("Unsupported image type".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
                if !bytes.is_empty() {
                    uploads.push((extension, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    let input = input.ok_or_else(|| AppError::BadRequest("Missing product data".to_string()))?;
    if uploads.is_empty() {
        return Err(AppError::BadRequest("No images uploaded".to_string()));
    }

    let images = store_images(&state.config().upload_dir, uploads).await?;
    let new_product = input
        .validate(images)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let product = ProductRepository::new(state.pool())
        .create(&new_product)
        .await?;

    tracing::info!(product_id = %product.id, name = %product.name, "Product added");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product added successfully",
            "product": ProductView::from(product),
        })),
    ))
}

/// POST /api/products/stock
#[instrument(skip_all, fields(product_id = %body.id))]
pub async fn set_stock(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
    Json(body): Json<StockRequest>,
) -> Result<impl IntoResponse> {
    let stock = u32::try_from(body.stock)
        .ok()
        .filter(|s| i32::try_from(*s).is_ok())
        .ok_or_else(|| AppError::BadRequest("Stock must be a non-negative number".to_string()))?;

    let product = ProductRepository::new(state.pool())
        .set_stock(body.id, stock)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    tracing::info!(product_id = %product.id, stock, "Stock updated");
    Ok(Json(json!({
        "success": true,
        "message": "Stock updated successfully",
        "product": ProductView::from(product),
    })))
}

/// Lowercased extension of an accepted image file name.
fn image_extension(file_name: &str) -> Option<String> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Write uploads under random names and return their public URLs.
async fn store_images(dir: &Path, uploads: Vec<(String, Vec<u8>)>) -> Result<Vec<String>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Internal(format!("cannot create upload dir: {e}")))?;

    let mut urls = Vec::with_capacity(uploads.len());
    for (extension, bytes) in uploads {
        let file_name = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(dir.join(&file_name), bytes)
            .await
            .map_err(|e| AppError::Internal(format!("cannot store image: {e}")))?;
        urls.push(format!("{UPLOADS_PATH}/{file_name}"));
    }
    Ok(urls)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("apple.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("photo.final.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("script.sh"), None);
        assert_eq!(image_extension("noextension"), None);
    }

    #[tokio::test]
    async fn test_store_images_uses_random_names() {
        let dir = std::env::temp_dir().join(format!("instabasket-test-{}", Uuid::new_v4()));
        let urls = store_images(
            &dir,
            vec![
                ("png".to_string(), vec![1, 2, 3]),
                ("jpg".to_string(), vec![4, 5]),
            ],
        )
        .await
        .unwrap();

        assert_eq!(urls.len(), 2);
        assert!(urls[0].starts_with("/uploads/") && urls[0].ends_with(".png"));
        assert_ne!(urls[0], urls[1]);

        let stored = urls[1].trim_start_matches("/uploads/");
        assert_eq!(tokio::fs::read(dir.join(stored)).await.unwrap(), vec![4, 5]);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
