use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_optional_text;
use crate::db::{
    CreateInvitationRequest, InvitationResponse, User, ValidateInvitationResponse,
};
use crate::invitations::{self, CodeScope, NewInvitation};
use crate::AppState;

/// Longest invitation lifetime a member may request
const MAX_EXPIRY_DAYS: i64 = 365;

/// Create an invitation owned by the current member
pub async fn create_invitation(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiError> {
    let rewards = &state.config.rewards;
    let expires_in_days = req.expires_in_days.unwrap_or(rewards.invitation_expiry_days);
    let max_uses = req.max_uses.unwrap_or(rewards.invitation_max_uses);

    let mut errors = ValidationErrorBuilder::new();
    if !(1..=MAX_EXPIRY_DAYS).contains(&expires_in_days) {
        errors.add(
            "expiresInDays",
            format!("Must be between 1 and {}", MAX_EXPIRY_DAYS),
        );
    }
    if max_uses < 1 {
        errors.add("maxUses", "Must be at least 1");
    }
    errors.check("message", validate_optional_text(&req.message, "Message", 500));
    errors.finish()?;

    let mut tx = state.db.begin().await?;
    let invitation = invitations::create_invitation(
        &mut tx,
        &user.id,
        NewInvitation {
            expires_in_days,
            max_uses,
            message: req.message,
            scope: CodeScope::Invitations,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        code = %invitation.code,
        max_uses = max_uses,
        "Invitation created"
    );

    Ok((StatusCode::CREATED, Json(InvitationResponse::from(invitation))))
}

/// Invitations sent by the current member
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<InvitationResponse>>, ApiError> {
    let mut conn = state.db.acquire().await?;
    let invitations = invitations::list_for_sender(&mut conn, &user.id).await?;
    Ok(Json(
        invitations.into_iter().map(InvitationResponse::from).collect(),
    ))
}

/// Public check of an invitation code.
///
/// Unusable codes are answered with `valid: false` and a reason rather than
/// an error status, so the sign-up form can explain what went wrong.
pub async fn validate_invitation(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<ValidateInvitationResponse>, ApiError> {
    let code = invitations::normalize_code(&code);
    let mut conn = state.db.acquire().await?;

    let invitation = match invitations::validate_invitation(&mut conn, &code).await {
        Ok(invitation) => invitation,
        Err(
            e @ (invitations::Error::InvalidCode
            | invitations::Error::Expired
            | invitations::Error::ExhaustedUses),
        ) => {
            return Ok(Json(ValidateInvitationResponse {
                valid: false,
                code,
                reason: Some(e.to_string()),
                club: None,
                sender_name: None,
                message: None,
                remaining_uses: None,
                expires_at: None,
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let sender = User::find_by_id(&mut conn, &invitation.sender_id).await?;

    Ok(Json(ValidateInvitationResponse {
        valid: true,
        code: invitation.code,
        reason: None,
        club: Some(
            sender
                .as_ref()
                .map(|s| s.club.clone())
                .unwrap_or_else(|| state.config.rewards.default_club.clone()),
        ),
        sender_name: sender.map(|s| format!("{} {}", s.first_name, s.last_name)),
        message: invitation.message,
        remaining_uses: Some(invitation.max_uses - invitation.current_uses),
        expires_at: Some(invitation.expires_at),
    }))
}
