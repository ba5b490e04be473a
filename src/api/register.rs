use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::{record_points_awarded, record_registration};
use super::validation::{
    validate_email, validate_invite_code, validate_name, validate_optional_text, validate_password,
    validate_phone,
};
use crate::db::{PointsType, RegisterRequest, RegisterResponse, UserResponse};
use crate::registration::{self, Registration};
use crate::AppState;

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("inviteCode", validate_invite_code(&req.invite_code))
        .check("email", validate_email(&req.email))
        .check("password", validate_password(&req.password))
        .check("firstName", validate_name(&req.first_name, "First name"))
        .check("lastName", validate_name(&req.last_name, "Last name"))
        .check("phone", validate_phone(&req.phone))
        .check("city", validate_optional_text(&req.city, "City", 100));
    errors.finish()
}

/// Register with an invitation code
///
/// Served at both `/api/register` and `/api/invitations/register`.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    validate_register_request(&req)?;

    let rewards = &state.config.rewards;
    let registered = match registration::register(&state.db, rewards, &req).await {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!(email = %req.email, error = %e, "Registration rejected");
            record_registration(false);
            return Err(e.into());
        }
    };

    record_registration(true);
    for (points_type, points) in bonuses_paid(&registered) {
        record_points_awarded(points_type, points);
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            user: UserResponse::from(registered.user),
        }),
    ))
}

/// Ledger credits a registration made, for the points counters
fn bonuses_paid(registered: &Registration) -> Vec<(PointsType, i64)> {
    [
        (PointsType::Bonus, registered.welcome_bonus),
        (PointsType::Invite, registered.referral_bonus),
    ]
    .into_iter()
    .filter(|(_, points)| *points > 0)
    .collect()
}
