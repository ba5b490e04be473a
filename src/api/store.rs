use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::{record_order, record_points_spent};
use super::validation::{validate_quantity, validate_uuid};
use crate::db::{
    AddToCartRequest, Cart, CreateOrderRequest, OrderWithItems, UpdateCartItemRequest, User,
};
use crate::store;
use crate::AppState;

/// Add a product to the current member's cart
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<Cart>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("productId", validate_uuid(&req.product_id, "productId"))
        .check("quantity", validate_quantity(req.quantity, 1));
    errors.finish()?;

    let mut tx = state.db.begin().await?;
    let cart = store::add_to_cart(&mut tx, &user.id, &req.product_id, req.quantity).await?;
    tx.commit().await?;

    Ok(Json(cart))
}

pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Cart>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let cart = store::get_cart(&mut conn, &user.id).await?;
    Ok(Json(cart))
}

/// Set the quantity of a cart line. Zero removes it.
pub async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    validate_quantity(req.quantity, 0).map_err(|e| ApiError::validation_field("quantity", e))?;

    let mut tx = state.db.begin().await?;
    let cart = store::update_cart_item(&mut tx, &user.id, &product_id, req.quantity).await?;
    tx.commit().await?;

    Ok(Json(cart))
}

/// Check out the current member's cart
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if req.shipping_address.trim().is_empty() {
        errors.add("shippingAddress", "Shipping address is required");
    }
    if req.payment_method.trim().is_empty() {
        errors.add("paymentMethod", "Payment method is required");
    }
    errors.finish()?;

    let order = match store::create_order(
        &state.db,
        &user.id,
        &req,
        state.config.rewards.points_discount_unit,
    )
    .await
    {
        Ok(order) => order,
        Err(e) => {
            record_order(false);
            tracing::warn!(user_id = %user.id, error = %e, "Checkout failed");
            return Err(e.into());
        }
    };

    record_order(true);
    record_points_spent(order.order.points_used);

    Ok((StatusCode::CREATED, Json(order)))
}

/// Orders of the current member, newest first
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<OrderWithItems>>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let orders = store::list_orders(&mut conn, &user.id).await?;
    Ok(Json(orders))
}
