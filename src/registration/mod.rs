//! Invite-only member registration.
//!
//! A registration claims one use of an invitation, creates the member with a
//! personal reusable code of their own, and pays the referral and welcome
//! bonuses through the ledger. Everything happens in a single transaction.

use sqlx::SqlitePool;
use tracing::info;

use crate::config::RewardsConfig;
use crate::crypto::hash_password;
use crate::db::{NewUser, PointsType, RegisterRequest, Role, User};
use crate::invitations::{self, CodeScope, NewInvitation};
use crate::points;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("email is already registered")]
    EmailAlreadyRegistered,
    #[error(transparent)]
    Invitation(#[from] invitations::Error),
    #[error(transparent)]
    Points(#[from] points::Error),
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false);
        if unique_violation {
            // Only the email can collide, codes are checked before insert
            Error::EmailAlreadyRegistered
        } else {
            Error::Database(err)
        }
    }
}

/// A completed registration and the bonuses it paid out
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    /// Points credited to the new member
    pub welcome_bonus: i64,
    /// Points credited to the code owner
    pub referral_bonus: i64,
}

/// Register a new member with an invitation code
pub async fn register(
    db: &SqlitePool,
    rewards: &RewardsConfig,
    req: &RegisterRequest,
) -> Result<Registration, Error> {
    let email = req.email.trim().to_lowercase();
    let password_hash =
        hash_password(&req.password).map_err(|e| Error::PasswordHash(e.to_string()))?;

    let mut tx = db.begin().await?;

    // Claiming first takes the write lock. Its outcome is reported after the
    // email check so a taken email wins over a bad code.
    let claimed = invitations::claim_use(&mut tx, &req.invite_code).await;
    if User::find_by_email(&mut tx, &email).await?.is_some() {
        return Err(Error::EmailAlreadyRegistered);
    }
    let invitation = claimed?;

    let sender = User::find_by_id(&mut tx, &invitation.sender_id).await?;
    let club = sender
        .as_ref()
        .map(|s| s.club.clone())
        .filter(|club| !club.trim().is_empty())
        .unwrap_or_else(|| rewards.default_club.clone());

    let personal_code =
        invitations::generate_unique_code(&mut tx, CodeScope::InvitationsAndUsers).await?;

    let user = User::insert(
        &mut tx,
        &NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            phone: req.phone.as_deref(),
            city: req.city.as_deref(),
            club: &club,
            role: Role::Member,
            invite_code: &personal_code,
            invited_by: Some(&invitation.sender_id),
        },
    )
    .await?;

    invitations::insert_invitation(
        &mut tx,
        &user.id,
        &personal_code,
        &NewInvitation {
            expires_in_days: rewards.personal_code_expiry_days,
            max_uses: rewards.personal_code_max_uses,
            message: None,
            scope: CodeScope::InvitationsAndUsers,
        },
    )
    .await?;

    invitations::record_receiver(&mut tx, &invitation, &user.id).await?;

    let mut referral_bonus = 0;
    if rewards.referral_bonus > 0 && sender.is_some() {
        referral_bonus = rewards.referral_bonus;
        points::add_points(
            &mut tx,
            &invitation.sender_id,
            rewards.referral_bonus,
            PointsType::Invite,
            &format!("Referral bonus for inviting {}", user.first_name),
            Some(&user.id),
        )
        .await?;
    }

    let mut welcome_bonus = 0;
    if rewards.welcome_bonus > 0 {
        welcome_bonus = rewards.welcome_bonus;
        points::add_points(
            &mut tx,
            &user.id,
            rewards.welcome_bonus,
            PointsType::Bonus,
            "Welcome bonus",
            Some(&invitation.id),
        )
        .await?;
    }

    let user = User::find_by_id(&mut tx, &user.id)
        .await?
        .ok_or(Error::Database(sqlx::Error::RowNotFound))?;

    tx.commit().await?;

    info!(
        user_id = %user.id,
        invited_by = %invitation.sender_id,
        invitation = %invitation.code,
        "Member registered"
    );

    Ok(Registration {
        user,
        welcome_bonus,
        referral_bonus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::db::{ensure_admin_user, init_in_memory, InvitationStatus};
    use chrono::Utc;

    async fn setup() -> (SqlitePool, User, RewardsConfig) {
        let db = init_in_memory().await.unwrap();
        let rewards = RewardsConfig::default();
        let auth = AuthConfig {
            admin_password: Some("admin-password-1".to_string()),
            ..Default::default()
        };
        let admin = ensure_admin_user(&db, &auth, &rewards).await.unwrap();
        (db, admin, rewards)
    }

    fn request(code: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            invite_code: code.to_string(),
            email: email.to_string(),
            password: "swim-bike-run".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Diaz".to_string(),
            phone: None,
            city: Some("Porto".to_string()),
        }
    }

    async fn balance(db: &SqlitePool, user_id: &str) -> (i64, i64) {
        let points: i64 = sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(db)
            .await
            .unwrap();
        let ledger: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points), 0) FROM points_history WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(db)
        .await
        .unwrap();
        (points, ledger)
    }

    #[tokio::test]
    async fn test_register_with_reusable_code() {
        let (db, admin, rewards) = setup().await;

        let user = register(&db, &rewards, &request(&admin.invite_code, "Ana@Example.com"))
            .await
            .unwrap()
            .user;
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.points, 100);
        assert_eq!(user.level, "BEGINNER");
        assert_eq!(user.club, admin.club);
        assert_eq!(user.invited_by.as_deref(), Some(admin.id.as_str()));
        assert_ne!(user.invite_code, admin.invite_code);

        assert_eq!(balance(&db, &user.id).await, (100, 100));
        assert_eq!(balance(&db, &admin.id).await, (200, 200));

        let mut conn = db.acquire().await.unwrap();
        let invitation = invitations::find_by_code(&mut conn, &admin.invite_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invitation.current_uses, 1);
        assert_eq!(invitation.status_at(Utc::now()), InvitationStatus::Pending);
        assert!(invitation.receiver_id.is_none());

        // The new member can invite others straight away
        let personal = invitations::validate_invitation(&mut conn, &user.invite_code)
            .await
            .unwrap();
        assert_eq!(personal.sender_id, user.id);
        assert_eq!(personal.max_uses, 999);
    }

    #[tokio::test]
    async fn test_ledger_references() {
        let (db, admin, rewards) = setup().await;
        let user = register(&db, &rewards, &request(&admin.invite_code, "ana@example.com"))
            .await
            .unwrap()
            .user;

        let (kind, reference): (String, Option<String>) = sqlx::query_as(
            "SELECT type, reference FROM points_history WHERE user_id = ?",
        )
        .bind(&admin.id)
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(kind, "INVITE");
        assert_eq!(reference.as_deref(), Some(user.id.as_str()));

        let (kind, reference): (String, Option<String>) = sqlx::query_as(
            "SELECT type, reference FROM points_history WHERE user_id = ?",
        )
        .bind(&user.id)
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(kind, "BONUS");
        assert!(reference.is_some());
    }

    #[tokio::test]
    async fn test_email_conflict_leaves_no_trace() {
        let (db, admin, rewards) = setup().await;
        register(&db, &rewards, &request(&admin.invite_code, "ana@example.com"))
            .await
            .unwrap();

        let err = register(&db, &rewards, &request(&admin.invite_code, "ANA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmailAlreadyRegistered));

        // Email is reported even when the code is bad too
        let err = register(&db, &rewards, &request("ZZZZZZZZ", "ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmailAlreadyRegistered));

        let current_uses: i64 =
            sqlx::query_scalar("SELECT current_uses FROM invitations WHERE code = ?")
                .bind(&admin.invite_code)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(current_uses, 1);
        assert_eq!(balance(&db, &admin.id).await, (200, 200));
    }

    #[tokio::test]
    async fn test_invalid_or_expired_code_creates_nothing() {
        let (db, admin, rewards) = setup().await;

        let err = register(&db, &rewards, &request("ZZZZZZZZ", "ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invitation(invitations::Error::InvalidCode)));

        sqlx::query("UPDATE invitations SET expires_at = '2000-01-01T00:00:00.000Z' WHERE code = ?")
            .bind(&admin.invite_code)
            .execute(&db)
            .await
            .unwrap();
        let err = register(&db, &rewards, &request(&admin.invite_code, "ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invitation(invitations::Error::Expired)));

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(users, 1);
        assert_eq!(balance(&db, &admin.id).await, (0, 0));
    }

    #[tokio::test]
    async fn test_single_use_code_records_receiver() {
        let (db, admin, rewards) = setup().await;
        let code = {
            let mut conn = db.acquire().await.unwrap();
            invitations::create_invitation(
                &mut conn,
                &admin.id,
                NewInvitation {
                    expires_in_days: 30,
                    max_uses: 1,
                    message: None,
                    scope: CodeScope::Invitations,
                },
            )
            .await
            .unwrap()
            .code
        };

        let user = register(&db, &rewards, &request(&code, "ana@example.com"))
            .await
            .unwrap()
            .user;
        let err = register(&db, &rewards, &request(&code, "ben@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invitation(invitations::Error::ExhaustedUses)));

        let mut conn = db.acquire().await.unwrap();
        let invitation = invitations::find_by_code(&mut conn, &code).await.unwrap().unwrap();
        assert_eq!(invitation.receiver_id.as_deref(), Some(user.id.as_str()));
        assert_eq!(invitation.status_at(Utc::now()), InvitationStatus::Used);
    }

    #[tokio::test]
    async fn test_club_falls_back_to_default() {
        let (db, admin, rewards) = setup().await;
        sqlx::query("UPDATE users SET club = '' WHERE id = ?")
            .bind(&admin.id)
            .execute(&db)
            .await
            .unwrap();
        let rewards = RewardsConfig {
            default_club: "Lake Runners".to_string(),
            ..rewards
        };

        let user = register(&db, &rewards, &request(&admin.invite_code, "ana@example.com"))
            .await
            .unwrap()
            .user;
        assert_eq!(user.club, "Lake Runners");
    }

    #[tokio::test]
    async fn test_reports_only_bonuses_paid() {
        let (db, admin, rewards) = setup().await;
        let registered = register(&db, &rewards, &request(&admin.invite_code, "ana@example.com"))
            .await
            .unwrap();
        assert_eq!(registered.welcome_bonus, 100);
        assert_eq!(registered.referral_bonus, 200);

        let rewards = RewardsConfig {
            welcome_bonus: 0,
            referral_bonus: 0,
            ..rewards
        };
        let registered = register(&db, &rewards, &request(&admin.invite_code, "ben@example.com"))
            .await
            .unwrap();
        assert_eq!(registered.welcome_bonus, 0);
        assert_eq!(registered.referral_bonus, 0);
        assert_eq!(registered.user.points, 0);
        assert_eq!(balance(&db, &registered.user.id).await, (0, 0));
        assert_eq!(balance(&db, &admin.id).await, (200, 200));
    }
}
