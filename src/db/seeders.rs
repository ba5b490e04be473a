//! Database seeders for built-in data
//!
//! The only built-in row is the bootstrap administrator. Members can only join
//! through an invitation, so the administrator also receives a reusable
//! personal code the first members register with.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::{NewUser, Role, User};
use crate::config::{AuthConfig, RewardsConfig};
use crate::crypto::{generate_password, hash_password};
use crate::invitations::{self, CodeScope, NewInvitation};

/// Create the administrator account if it does not exist yet
pub async fn ensure_admin_user(
    pool: &SqlitePool,
    auth: &AuthConfig,
    rewards: &RewardsConfig,
) -> Result<User> {
    let email = auth.admin_email.trim().to_lowercase();

    let mut conn = pool.acquire().await?;
    if let Some(existing) = User::find_by_email(&mut conn, &email).await? {
        return Ok(existing);
    }
    drop(conn);

    let password = match &auth.admin_password {
        Some(password) => password.clone(),
        None => {
            let generated = generate_password();
            warn!(
                email = %email,
                password = %generated,
                "No admin password configured, generated one. Change it after first login."
            );
            generated
        }
    };
    let password_hash =
        hash_password(&password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    let mut tx = pool.begin().await?;
    let code = invitations::generate_unique_code(&mut tx, CodeScope::InvitationsAndUsers)
        .await
        .context("Failed to generate admin invite code")?;

    let admin = User::insert(
        &mut tx,
        &NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: "Club",
            last_name: "Admin",
            phone: None,
            city: None,
            club: &rewards.default_club,
            role: Role::Admin,
            invite_code: &code,
            invited_by: None,
        },
    )
    .await?;

    invitations::insert_invitation(
        &mut tx,
        &admin.id,
        &code,
        &NewInvitation {
            expires_in_days: rewards.personal_code_expiry_days,
            max_uses: rewards.personal_code_max_uses,
            message: None,
            scope: CodeScope::InvitationsAndUsers,
        },
    )
    .await
    .context("Failed to create admin invitation")?;

    tx.commit().await?;

    info!(email = %email, invite_code = %code, "Created admin user");
    Ok(admin)
}
