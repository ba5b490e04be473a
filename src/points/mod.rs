//! Points economy: workout calculators and the member ledger.

pub mod calculator;
pub mod ledger;

pub use calculator::{calculate_bucketed_points, calculate_points, Strategy};
pub use ledger::{add_points, get_balance, get_history, spend_points};

use sqlx::SqlitePool;

use crate::db::{LedgerUpdate, PointsType};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("points must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("insufficient points: {available} available, {requested} requested")]
    InsufficientPoints { available: i64, requested: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Credit points in a transaction of its own
pub async fn credit(
    db: &SqlitePool,
    user_id: &str,
    points: i64,
    points_type: PointsType,
    description: &str,
    reference: Option<&str>,
) -> Result<LedgerUpdate, Error> {
    let mut tx = db.begin().await?;
    let update = add_points(&mut tx, user_id, points, points_type, description, reference).await?;
    tx.commit().await?;
    Ok(update)
}

/// Debit points in a transaction of its own
pub async fn debit(
    db: &SqlitePool,
    user_id: &str,
    points: i64,
    description: &str,
    reference: Option<&str>,
) -> Result<LedgerUpdate, Error> {
    let mut tx = db.begin().await?;
    let update = spend_points(&mut tx, user_id, points, description, reference).await?;
    tx.commit().await?;
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_in_memory, now_timestamp};

    async fn insert_user(db: &SqlitePool, id: &str) {
        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, club,
                               invite_code, created_at, updated_at)
            VALUES (?, ?, 'x', 'Test', 'Member', 'TriClub', ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(format!("{}@example.com", id))
        .bind(format!("CODE{}", id.to_uppercase()))
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_spends_never_overdraw() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1").await;
        tokio_test::assert_ok!(credit(&db, "u1", 100, PointsType::Bonus, "Grant", None).await);

        let (a, b) = tokio::join!(
            debit(&db, "u1", 80, "First", None),
            debit(&db, "u1", 80, "Second", None),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let failure = if a.is_err() { a } else { b };
        assert!(matches!(failure, Err(Error::InsufficientPoints { .. })));

        let balance: i64 = sqlx::query_scalar("SELECT points FROM users WHERE id = 'u1'")
            .fetch_one(&db)
            .await
            .unwrap();
        let ledger: i64 =
            sqlx::query_scalar("SELECT SUM(points) FROM points_history WHERE user_id = 'u1'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(balance, 20);
        assert_eq!(ledger, balance);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_debits_on_shared_pool() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::init(dir.path()).await.unwrap();
        insert_user(&db, "u1").await;
        credit(&db, "u1", 100, PointsType::Bonus, "Grant", None)
            .await
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move { debit(&db, "u1", 30, &format!("Spend {}", i), None).await })
            })
            .collect();

        let mut spent = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => spent += 1,
                Err(Error::InsufficientPoints { .. }) => {}
                Err(e) => panic!("unexpected debit error: {}", e),
            }
        }
        assert_eq!(spent, 3);

        let balance: i64 = sqlx::query_scalar("SELECT points FROM users WHERE id = 'u1'")
            .fetch_one(&db)
            .await
            .unwrap();
        let ledger: i64 =
            sqlx::query_scalar("SELECT SUM(points) FROM points_history WHERE user_id = 'u1'")
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(balance, 10);
        assert_eq!(ledger, balance);

        db.close().await;
    }
}
