//! Catalog products.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use tableside_core::{MAX_AMOUNT, ProductId, round_money};

use crate::db::products::ProductRepository;
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireManager};
use crate::models::product::{CreateProductInput, Product, UpdateProductInput};
use crate::state::AppState;

/// Query of `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

fn check_price(price: Decimal) -> Result<(), AppError> {
    if price < Decimal::ZERO {
        return Err(AppError::BadRequest("price cannot be negative".to_string()));
    }
    if round_money(price) != price {
        return Err(AppError::BadRequest(
            "price has more than two decimal places".to_string(),
        ));
    }
    if price > MAX_AMOUNT {
        return Err(AppError::BadRequest(format!(
            "price must be at most {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

fn check_create(input: &CreateProductInput) -> Result<(), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    check_price(input.price)?;
    if input.stock_quantity < 0 {
        return Err(AppError::BadRequest(
            "stock_quantity cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// List the store's products.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let store_id = user.store_scope()?;
    let include_inactive = query.include_inactive && user.role.can_manage();
    Ok(Json(
        ProductRepository::new(state.pool())
            .list(store_id, include_inactive)
            .await?,
    ))
}

/// Get one product.
///
/// # Errors
///
/// Returns 404 if the product is not in the store.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    let store_id = user.store_scope()?;
    ProductRepository::new(state.pool())
        .get(store_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// Add a product to the catalog.
///
/// # Errors
///
/// Returns 400 for invalid fields and 409 for a duplicate SKU.
#[instrument(skip(state, user, body))]
pub async fn create(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(body): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let store_id = user.store_scope()?;
    check_create(&body)?;

    let product = ProductRepository::new(state.pool())
        .create(store_id, &body)
        .await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product. Stock is changed through inventory adjustments only.
///
/// # Errors
///
/// Returns 404 if the product is not in the store.
#[instrument(skip(state, user, body))]
pub async fn update(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateProductInput>,
) -> Result<Json<Product>, AppError> {
    let store_id = user.store_scope()?;
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if let Some(price) = body.price {
        check_price(price)?;
    }

    Ok(Json(
        ProductRepository::new(state.pool())
            .update(store_id, id, &body)
            .await?,
    ))
}

/// Deactivate a product. Past orders keep referring to it.
///
/// # Errors
///
/// Returns 404 if the product is not in the store.
#[instrument(skip(state, user))]
pub async fn deactivate(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    let store_id = user.store_scope()?;
    ProductRepository::new(state.pool())
        .deactivate(store_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(price: Decimal, stock: i32) -> CreateProductInput {
        CreateProductInput {
            name: "Croissant".to_string(),
            sku: None,
            category: Some("Bakery".to_string()),
            price,
            track_inventory: true,
            stock_quantity: stock,
        }
    }

    #[test]
    fn test_check_create() {
        assert!(check_create(&input(Decimal::new(325, 2), 12)).is_ok());
        assert!(check_create(&input(Decimal::new(-1, 0), 12)).is_err());
        assert!(check_create(&input(Decimal::new(3255, 3), 12)).is_err());
        assert!(check_create(&input(Decimal::new(325, 2), -1)).is_err());
        assert!(check_create(&input(MAX_AMOUNT, 0)).is_ok());
        assert!(check_create(&input(MAX_AMOUNT + Decimal::new(1, 2), 0)).is_err());

        let mut unnamed = input(Decimal::ONE, 0);
        unnamed.name = " ".to_string();
        assert!(check_create(&unnamed).is_err());
    }
}
