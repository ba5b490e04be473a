//! Member, level and session models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Member tier derived from lifetime earned points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
    Elite,
}

impl Level {
    /// Level reached after earning `points` in total (spending never lowers it)
    pub fn from_lifetime_points(points: i64) -> Self {
        match points {
            i64::MIN..=999 => Level::Beginner,
            1_000..=4_999 => Level::Intermediate,
            5_000..=14_999 => Level::Advanced,
            _ => Level::Elite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "BEGINNER",
            Level::Intermediate => "INTERMEDIATE",
            Level::Advanced => "ADVANCED",
            Level::Elite => "ELITE",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BEGINNER" => Ok(Level::Beginner),
            "INTERMEDIATE" => Ok(Level::Intermediate),
            "ADVANCED" => Ok(Level::Advanced),
            "ELITE" => Ok(Level::Elite),
            _ => Err(format!("Unknown level: {}", s)),
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "admin" => Role::Admin,
            _ => Role::Member,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub club: String,
    pub role: String,
    /// Current balance, only ever changed by the points ledger
    pub points: i64,
    pub level: String,
    /// The member's own referral code
    pub invite_code: String,
    pub invited_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.role_enum() == Role::Admin
    }

    pub async fn find_by_id(
        conn: &mut sqlx::SqliteConnection,
        id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_by_email(
        conn: &mut sqlx::SqliteConnection,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(conn)
            .await
    }

    /// Insert a member with an empty balance. Points are granted through the ledger.
    pub async fn insert(
        conn: &mut sqlx::SqliteConnection,
        new: &NewUser<'_>,
    ) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = super::now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, phone, city,
                               club, role, points, level, invite_code, invited_by,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.phone)
        .bind(new.city)
        .bind(new.club)
        .bind(new.role.as_str())
        .bind(Level::Beginner.as_str())
        .bind(new.invite_code)
        .bind(new.invited_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&mut *conn)
            .await
    }
}

/// Fields for a new member row
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub city: Option<&'a str>,
    pub club: &'a str,
    pub role: Role,
    pub invite_code: &'a str,
    pub invited_by: Option<&'a str>,
}

/// Public view of a member (never exposes the password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub club: String,
    pub role: String,
    pub points: i64,
    pub level: String,
    pub invite_code: String,
    pub invited_by: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            city: user.city,
            club: user.club,
            role: user.role,
            points: user.points,
            level: user.level,
            invite_code: user.invite_code,
            invited_by: user.invited_by,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub invite_code: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}
