//! Invitation registry.
//!
//! Codes are 8 characters from `[A-Z0-9]`. Reuse is governed only by
//! `max_uses`; the status shown to clients is derived from the counters and
//! the expiry date and never consulted when validating.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::db::{format_timestamp, Invitation};

/// Characters allowed in invitation codes
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const CODE_LENGTH: usize = 8;

/// Attempts made to find a free code before giving up
pub const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invitation code not found")]
    InvalidCode,
    #[error("invitation code has expired")]
    Expired,
    #[error("invitation code has no uses left")]
    ExhaustedUses,
    #[error("could not generate a unique code after {0} attempts")]
    CodeGenerationExhausted(usize),
    #[error("invalid invitation parameters: {0}")]
    InvalidParameters(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tables a fresh code must not collide with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeScope {
    /// Codes created by members for others
    Invitations,
    /// Personal codes, which are also stored on the member row
    InvitationsAndUsers,
}

/// Parameters for a new invitation
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub expires_in_days: i64,
    pub max_uses: i64,
    pub message: Option<String>,
    pub scope: CodeScope,
}

/// Generate a random code. Not checked for uniqueness.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Normalize user input to the stored form of a code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub async fn generate_unique_code(
    conn: &mut SqliteConnection,
    scope: CodeScope,
) -> Result<String, Error> {
    generate_unique_code_with(conn, scope, generate_code).await
}

/// Draw codes from `next_code` until one is free in `scope`
pub async fn generate_unique_code_with<F>(
    conn: &mut SqliteConnection,
    scope: CodeScope,
    mut next_code: F,
) -> Result<String, Error>
where
    F: FnMut() -> String,
{
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = next_code();
        if !code_exists(&mut *conn, &code, scope).await? {
            return Ok(code);
        }
        debug!(attempt = attempt, "Invitation code collision, retrying");
    }

    warn!(
        attempts = MAX_CODE_ATTEMPTS,
        "Exhausted attempts to generate a unique invitation code"
    );
    Err(Error::CodeGenerationExhausted(MAX_CODE_ATTEMPTS))
}

async fn code_exists(
    conn: &mut SqliteConnection,
    code: &str,
    scope: CodeScope,
) -> Result<bool, sqlx::Error> {
    let sql = match scope {
        CodeScope::Invitations => "SELECT EXISTS(SELECT 1 FROM invitations WHERE code = ?1)",
        CodeScope::InvitationsAndUsers => {
            "SELECT EXISTS(SELECT 1 FROM invitations WHERE code = ?1)
                 OR EXISTS(SELECT 1 FROM users WHERE invite_code = ?1)"
        }
    };
    sqlx::query_scalar(sql).bind(code).fetch_one(conn).await
}

/// Create an invitation owned by `sender_id`
pub async fn create_invitation(
    conn: &mut SqliteConnection,
    sender_id: &str,
    params: NewInvitation,
) -> Result<Invitation, Error> {
    let code = generate_unique_code(&mut *conn, params.scope).await?;
    insert_invitation(conn, sender_id, &code, &params).await
}

/// Insert an invitation whose code has already been reserved
pub async fn insert_invitation(
    conn: &mut SqliteConnection,
    sender_id: &str,
    code: &str,
    params: &NewInvitation,
) -> Result<Invitation, Error> {
    if params.max_uses < 1 {
        return Err(Error::InvalidParameters(
            "max_uses must be at least 1".to_string(),
        ));
    }
    if params.expires_in_days < 1 {
        return Err(Error::InvalidParameters(
            "expires_in_days must be at least 1".to_string(),
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires_at = now + Duration::days(params.expires_in_days);

    sqlx::query(
        r#"
        INSERT INTO invitations (id, code, sender_id, message, max_uses, current_uses,
                                 expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(code)
    .bind(sender_id)
    .bind(&params.message)
    .bind(params.max_uses)
    .bind(format_timestamp(expires_at))
    .bind(format_timestamp(now))
    .execute(&mut *conn)
    .await?;

    let invitation = sqlx::query_as("SELECT * FROM invitations WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *conn)
        .await?;

    debug!(sender_id = %sender_id, code = %code, max_uses = params.max_uses, "Invitation created");
    Ok(invitation)
}

pub async fn find_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Invitation>, Error> {
    let invitation = sqlx::query_as("SELECT * FROM invitations WHERE code = ?")
        .bind(normalize_code(code))
        .fetch_optional(conn)
        .await?;
    Ok(invitation)
}

/// Whether `invitation` can be redeemed at `now`. Expiry is checked first.
pub fn check_usable(invitation: &Invitation, now: DateTime<Utc>) -> Result<(), Error> {
    if invitation.is_expired_at(now) {
        return Err(Error::Expired);
    }
    if !invitation.has_remaining_uses() {
        return Err(Error::ExhaustedUses);
    }
    Ok(())
}

/// Look up a code and check that it can be redeemed
pub async fn validate_invitation(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Invitation, Error> {
    let invitation = find_by_code(conn, code).await?.ok_or(Error::InvalidCode)?;
    check_usable(&invitation, Utc::now())?;
    Ok(invitation)
}

/// Consume one use of a code.
///
/// The counter only moves while the code is unexpired and below `max_uses`,
/// so concurrent claims of the last use yield a single winner.
pub async fn claim_use(conn: &mut SqliteConnection, code: &str) -> Result<Invitation, Error> {
    let code = normalize_code(code);
    let now = format_timestamp(Utc::now());

    let claimed = sqlx::query(
        r#"
        UPDATE invitations
        SET current_uses = current_uses + 1, used_at = ?
        WHERE code = ? AND expires_at >= ? AND current_uses < max_uses
        "#,
    )
    .bind(&now)
    .bind(&code)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    let invitation: Option<Invitation> = sqlx::query_as("SELECT * FROM invitations WHERE code = ?")
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;
    let invitation = invitation.ok_or(Error::InvalidCode)?;

    if claimed.rows_affected() == 0 {
        check_usable(&invitation, Utc::now())?;
        // Usable now but the update missed, so the expiry passed in between
        return Err(Error::Expired);
    }

    Ok(invitation)
}

/// Record who redeemed a single-use invitation. Reusable codes keep no receiver.
pub async fn record_receiver(
    conn: &mut SqliteConnection,
    invitation: &Invitation,
    receiver_id: &str,
) -> Result<(), Error> {
    if invitation.max_uses != 1 {
        return Ok(());
    }
    sqlx::query("UPDATE invitations SET receiver_id = ? WHERE id = ?")
        .bind(receiver_id)
        .bind(&invitation.id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Invitations created by `sender_id`, newest first
pub async fn list_for_sender(
    conn: &mut SqliteConnection,
    sender_id: &str,
) -> Result<Vec<Invitation>, Error> {
    let invitations = sqlx::query_as(
        "SELECT * FROM invitations WHERE sender_id = ? ORDER BY created_at DESC, id ASC",
    )
    .bind(sender_id)
    .fetch_all(conn)
    .await?;
    Ok(invitations)
}
