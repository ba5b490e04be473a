//! Invitation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::parse_timestamp;

/// Informational status, always derived from expiry and usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Used,
    Expired,
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationStatus::Pending => write!(f, "PENDING"),
            InvitationStatus::Used => write!(f, "USED"),
            InvitationStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: String,
    pub code: String,
    pub sender_id: String,
    /// Only recorded for single-use invitations
    pub receiver_id: Option<String>,
    pub message: Option<String>,
    pub max_uses: i64,
    pub current_uses: i64,
    pub expires_at: String,
    pub used_at: Option<String>,
    pub created_at: String,
}

impl Invitation {
    /// Check if the invitation has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match parse_timestamp(&self.expires_at) {
            Some(expires) => expires < now,
            None => true, // Treat parse errors as expired
        }
    }

    pub fn has_remaining_uses(&self) -> bool {
        self.current_uses < self.max_uses
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.is_expired_at(now) {
            InvitationStatus::Expired
        } else if !self.has_remaining_uses() {
            InvitationStatus::Used
        } else {
            InvitationStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    pub id: String,
    pub code: String,
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub message: Option<String>,
    pub max_uses: i64,
    pub current_uses: i64,
    pub status: InvitationStatus,
    pub expires_at: String,
    pub used_at: Option<String>,
    pub created_at: String,
}

impl From<Invitation> for InvitationResponse {
    fn from(inv: Invitation) -> Self {
        let status = inv.status_at(Utc::now());
        Self {
            id: inv.id,
            code: inv.code,
            sender_id: inv.sender_id,
            receiver_id: inv.receiver_id,
            message: inv.message,
            max_uses: inv.max_uses,
            current_uses: inv.current_uses,
            status,
            expires_at: inv.expires_at,
            used_at: inv.used_at,
            created_at: inv.created_at,
        }
    }
}

/// Request to create an invitation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub expires_in_days: Option<i64>,
    pub max_uses: Option<i64>,
    pub message: Option<String>,
}

/// Public answer to "can this code be used to register?"
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateInvitationResponse {
    pub valid: bool,
    pub code: String,
    /// Why the code cannot be used, when `valid` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub club: Option<String>,
    pub sender_name: Option<String>,
    pub message: Option<String>,
    pub remaining_uses: Option<i64>,
    pub expires_at: Option<String>,
}
