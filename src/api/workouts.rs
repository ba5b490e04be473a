use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::AdminUser;
use super::error::ApiError;
use super::metrics::record_points_awarded;
use super::validation::validate_uuid;
use crate::db::{
    AdminCreateWorkoutRequest, AdminWorkoutQuery, CreateWorkoutRequest, PageQuery, PointsType,
    StatsQuery, User, Workout, WorkoutStats,
};
use crate::points::Strategy;
use crate::workouts;
use crate::AppState;

/// Log a workout for the current member
pub async fn create_workout(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateWorkoutRequest>,
) -> Result<(StatusCode, Json<Workout>), ApiError> {
    let workout = workouts::create_workout(&state.db, &user.id, &req, Strategy::Continuous).await?;
    record_points_awarded(PointsType::Workout, workout.points);
    Ok((StatusCode::CREATED, Json(workout)))
}

pub async fn list_workouts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
    user: User,
) -> Result<Json<Vec<Workout>>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let workouts = workouts::list_workouts(&mut conn, Some(&user.id), query.limit).await?;
    Ok(Json(workouts))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
    user: User,
) -> Result<Json<WorkoutStats>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let stats = workouts::get_stats(&mut conn, &user.id, query.period).await?;
    Ok(Json(stats))
}

/// Record a workout on behalf of a member (admin only).
///
/// Scored with the bucketed rules and marked as a manual entry.
pub async fn admin_create_workout(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<AdminCreateWorkoutRequest>,
) -> Result<(StatusCode, Json<Workout>), ApiError> {
    validate_uuid(&req.user_id, "userId").map_err(|e| ApiError::validation_field("userId", e))?;

    let workout =
        workouts::create_workout(&state.db, &req.user_id, &req.workout, Strategy::Bucketed).await?;
    record_points_awarded(PointsType::Workout, workout.points);

    tracing::info!(
        admin_id = %admin.id,
        user_id = %req.user_id,
        workout_id = %workout.id,
        "Manual workout recorded"
    );

    Ok((StatusCode::CREATED, Json(workout)))
}

/// Workouts across all members, optionally for one member (admin only)
pub async fn admin_list_workouts(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<AdminWorkoutQuery>,
) -> Result<Json<Vec<Workout>>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let workouts =
        workouts::list_workouts(&mut conn, query.user_id.as_deref(), query.limit).await?;
    Ok(Json(workouts))
}
