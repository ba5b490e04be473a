use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use super::auth::AdminUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::{record_points_awarded, record_points_spent};
use super::validation::{validate_optional_text, validate_points, validate_uuid};
use crate::db::{
    AddPointsRequest, BalanceResponse, HistoryPage, HistoryQuery, LedgerUpdate,
    SpendPointsRequest, User,
};
use crate::points;
use crate::AppState;

fn validate_description(description: &str) -> Result<(), String> {
    if description.trim().is_empty() {
        return Err("Description is required".to_string());
    }
    validate_optional_text(&Some(description.to_string()), "Description", 255)
}

/// Balance and level of the current member
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<BalanceResponse>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let points = points::get_balance(&mut conn, &user.id).await?;
    Ok(Json(BalanceResponse {
        user_id: user.id,
        points,
        level: user.level,
    }))
}

/// Ledger entries of the current member, newest first
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
    user: User,
) -> Result<Json<HistoryPage>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let page = points::get_history(&mut conn, &user.id, query.limit, query.cursor).await?;
    Ok(Json(page))
}

/// Award points to any member (admin only)
pub async fn add_points(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<AddPointsRequest>,
) -> Result<Json<LedgerUpdate>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("userId", validate_uuid(&req.user_id, "userId"))
        .check("points", validate_points(req.points))
        .check("description", validate_description(&req.description));
    errors.finish()?;

    let update = points::credit(
        &state.db,
        &req.user_id,
        req.points,
        req.points_type,
        req.description.trim(),
        req.reference.as_deref(),
    )
    .await?;

    record_points_awarded(req.points_type, req.points);
    tracing::info!(
        admin_id = %admin.id,
        user_id = %req.user_id,
        points = req.points,
        points_type = req.points_type.as_str(),
        "Points awarded"
    );

    Ok(Json(update))
}

/// Spend the current member's points
pub async fn spend_points(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<SpendPointsRequest>,
) -> Result<Json<LedgerUpdate>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("points", validate_points(req.points))
        .check("description", validate_description(&req.description));
    errors.finish()?;

    let update = points::debit(
        &state.db,
        &user.id,
        req.points,
        req.description.trim(),
        req.reference.as_deref(),
    )
    .await?;

    record_points_spent(req.points);
    tracing::info!(user_id = %user.id, points = req.points, "Points spent");

    Ok(Json(update))
}
