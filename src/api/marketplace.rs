use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_name, validate_optional_text, validate_price, validate_product_points, validate_stock,
};
use crate::db::{CreateProductRequest, Product, ProductPage, ProductQuery, User};
use crate::AppState;

/// Public product listing
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductPage>, ApiError> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(ApiError::validation_field(
                "minPrice",
                "minPrice cannot be greater than maxPrice",
            ));
        }
    }
    let page = Product::search(&state.db, &query).await?;
    Ok(Json(page))
}

fn validate_product(req: &CreateProductRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_name(&req.name, "Name"))
        .check("category", validate_name(&req.category, "Category"))
        .check(
            "description",
            validate_optional_text(&req.description, "Description", 2000),
        )
        .check("currentPrice", validate_price(req.current_price))
        .check("stock", validate_stock(req.stock))
        .check(
            "pointsRequired",
            validate_product_points(req.points_required, "Points required"),
        )
        .check(
            "pointsDiscount",
            validate_product_points(req.points_discount, "Points discount"),
        );
    errors.finish()
}

/// List a product for sale, with the current member as seller
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validate_product(&req)?;

    let product = Product::create(&state.db, Some(&user.id), &req).await?;
    tracing::info!(
        product_id = %product.id,
        seller_id = %user.id,
        category = %product.category,
        "Product listed"
    );

    Ok((StatusCode::CREATED, Json(product)))
}
