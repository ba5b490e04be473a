//! Points ledger.
//!
//! `users.points` is a cached balance of the append-only `points_history`
//! table. Both are only written here, inside the caller's transaction, so the
//! sum of a member's entries always equals their balance.

use sqlx::SqliteConnection;
use tracing::debug;

use super::Error;
use crate::db::{
    clamp_limit, now_timestamp, HistoryPage, Level, LedgerUpdate, PointsHistoryEntry, PointsType,
};

/// Credit `points` to a member and recompute their level.
///
/// The balance update is the first statement so the transaction holds the
/// write lock before anything is read.
pub async fn add_points(
    conn: &mut SqliteConnection,
    user_id: &str,
    points: i64,
    points_type: PointsType,
    description: &str,
    reference: Option<&str>,
) -> Result<LedgerUpdate, Error> {
    if points <= 0 {
        return Err(Error::InvalidAmount(points));
    }

    let now = now_timestamp();
    let updated = sqlx::query("UPDATE users SET points = points + ?, updated_at = ? WHERE id = ?")
        .bind(points)
        .bind(&now)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::UserNotFound(user_id.to_string()));
    }

    let entry = append_entry(
        &mut *conn,
        user_id,
        points,
        points_type,
        description,
        reference,
        &now,
    )
    .await?;

    let lifetime: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(points), 0) FROM points_history WHERE user_id = ? AND points > 0",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    let level = Level::from_lifetime_points(lifetime);

    sqlx::query("UPDATE users SET level = ? WHERE id = ?")
        .bind(level.as_str())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let balance = get_balance(&mut *conn, user_id).await?;

    debug!(
        user_id = %user_id,
        points = points,
        points_type = %points_type,
        balance = balance,
        "Points credited"
    );

    Ok(LedgerUpdate {
        entry,
        balance,
        level: level.to_string(),
    })
}

/// Debit `points` from a member.
///
/// The decrement only applies while the balance covers it, so concurrent
/// spends can never take a balance below zero.
pub async fn spend_points(
    conn: &mut SqliteConnection,
    user_id: &str,
    points: i64,
    description: &str,
    reference: Option<&str>,
) -> Result<LedgerUpdate, Error> {
    if points <= 0 {
        return Err(Error::InvalidAmount(points));
    }

    let now = now_timestamp();
    let updated = sqlx::query(
        "UPDATE users SET points = points - ?, updated_at = ? WHERE id = ? AND points >= ?",
    )
    .bind(points)
    .bind(&now)
    .bind(user_id)
    .bind(points)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        let balance: Option<i64> = sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match balance {
            Some(available) => Error::InsufficientPoints {
                available,
                requested: points,
            },
            None => Error::UserNotFound(user_id.to_string()),
        });
    }

    let entry = append_entry(
        &mut *conn,
        user_id,
        -points,
        PointsType::Sale,
        description,
        reference,
        &now,
    )
    .await?;

    let (balance, level): (i64, String) =
        sqlx::query_as("SELECT points, level FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

    debug!(
        user_id = %user_id,
        points = points,
        balance = balance,
        "Points debited"
    );

    Ok(LedgerUpdate {
        entry,
        balance,
        level,
    })
}

/// Current balance of a member
pub async fn get_balance(conn: &mut SqliteConnection, user_id: &str) -> Result<i64, Error> {
    let balance: Option<i64> = sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    balance.ok_or_else(|| Error::UserNotFound(user_id.to_string()))
}

/// One page of history, newest first. `cursor` is the id of the last entry
/// of the previous page.
pub async fn get_history(
    conn: &mut SqliteConnection,
    user_id: &str,
    limit: Option<i64>,
    cursor: Option<i64>,
) -> Result<HistoryPage, Error> {
    let limit = clamp_limit(limit);

    // Fetch one extra row to learn whether another page exists
    let mut items: Vec<PointsHistoryEntry> = sqlx::query_as(
        r#"
        SELECT * FROM points_history
        WHERE user_id = ? AND (? IS NULL OR id < ?)
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(cursor)
    .bind(cursor)
    .bind(limit + 1)
    .fetch_all(conn)
    .await?;

    let next_cursor = if items.len() as i64 > limit {
        items.truncate(limit as usize);
        items.last().map(|entry| entry.id)
    } else {
        None
    };

    Ok(HistoryPage { items, next_cursor })
}

async fn append_entry(
    conn: &mut SqliteConnection,
    user_id: &str,
    points: i64,
    points_type: PointsType,
    description: &str,
    reference: Option<&str>,
    created_at: &str,
) -> Result<PointsHistoryEntry, Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO points_history (user_id, points, type, description, reference, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(points)
    .bind(points_type.as_str())
    .bind(description)
    .bind(reference)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    let entry = sqlx::query_as("SELECT * FROM points_history WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&mut *conn)
        .await?;
    Ok(entry)
}
