//! Workout log.
//!
//! Points for a workout are fixed when it is stored and paid out through the
//! ledger in the same transaction.

use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::db::{
    clamp_limit, format_timestamp, now_timestamp, parse_timestamp, CreateWorkoutRequest,
    PointsType, StatsPeriod, TypeStats, Workout, WorkoutSource, WorkoutStats,
};
use crate::points::{self, Strategy};

/// Longest accepted workout, in minutes
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Longest accepted workout distance, in kilometres
pub const MAX_DISTANCE_KM: f64 = 1_000.0;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid workout: {0}")]
    Invalid(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error(transparent)]
    Points(#[from] points::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Check the measurable fields of a workout
pub fn validate(req: &CreateWorkoutRequest) -> Result<(), Error> {
    if req.duration < 1 || req.duration > MAX_DURATION_MINUTES {
        return Err(Error::Invalid(format!(
            "duration must be between 1 and {} minutes",
            MAX_DURATION_MINUTES
        )));
    }
    if let Some(distance) = req.distance {
        if !distance.is_finite() || distance < 0.0 {
            return Err(Error::Invalid("distance must be a non-negative number".to_string()));
        }
        if distance > MAX_DISTANCE_KM {
            return Err(Error::Invalid(format!(
                "distance cannot exceed {} km",
                MAX_DISTANCE_KM
            )));
        }
    }
    if let Some(heart_rate) = req.heart_rate {
        if !(30..=250).contains(&heart_rate) {
            return Err(Error::Invalid("heart rate must be between 30 and 250".to_string()));
        }
    }
    if let Some(calories) = req.calories {
        if calories < 0 {
            return Err(Error::Invalid("calories cannot be negative".to_string()));
        }
    }
    if let Some(performed_at) = &req.performed_at {
        if parse_timestamp(performed_at).is_none() {
            return Err(Error::Invalid("performedAt must be an RFC 3339 timestamp".to_string()));
        }
    }
    Ok(())
}

/// Store a workout for `user_id` and award its points
pub async fn create_workout(
    db: &SqlitePool,
    user_id: &str,
    req: &CreateWorkoutRequest,
    strategy: Strategy,
) -> Result<Workout, Error> {
    validate(req)?;

    let duration_seconds = (req.duration * 60) as f64;
    let distance_meters = req.distance.unwrap_or(0.0) * 1000.0;
    let points = strategy.calculate(req.workout_type, duration_seconds, distance_meters);
    let source = match strategy {
        Strategy::Continuous => WorkoutSource::Auto,
        Strategy::Bucketed => WorkoutSource::Manual,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();
    let performed_at = req
        .performed_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(format_timestamp)
        .unwrap_or_else(|| now.clone());

    let mut tx = db.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO workouts (id, user_id, type, duration, distance, calories, heart_rate,
                              points, source, notes, performed_at, created_at)
        SELECT ?, id, ?, ?, ?, ?, ?, ?, ?, ?, ?, ? FROM users WHERE id = ?
        "#,
    )
    .bind(&id)
    .bind(req.workout_type.as_str())
    .bind(req.duration)
    .bind(req.distance)
    .bind(req.calories)
    .bind(req.heart_rate)
    .bind(points)
    .bind(source.as_str())
    .bind(&req.notes)
    .bind(&performed_at)
    .bind(&now)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
    if inserted.rows_affected() == 0 {
        return Err(Error::UserNotFound(user_id.to_string()));
    }

    if points > 0 {
        points::add_points(
            &mut tx,
            user_id,
            points,
            PointsType::Workout,
            &format!("{} workout, {} min", req.workout_type, req.duration),
            Some(&id),
        )
        .await?;
    }

    let workout: Workout = sqlx::query_as("SELECT * FROM workouts WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        workout_id = %id,
        user_id = %user_id,
        workout_type = %req.workout_type,
        points = points,
        source = source.as_str(),
        "Workout logged"
    );

    Ok(workout)
}

/// Most recent workouts first
pub async fn list_workouts(
    conn: &mut SqliteConnection,
    user_id: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<Workout>, Error> {
    let workouts = sqlx::query_as(
        r#"
        SELECT * FROM workouts
        WHERE (? IS NULL OR user_id = ?)
        ORDER BY performed_at DESC, id ASC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(clamp_limit(limit))
    .fetch_all(conn)
    .await?;
    Ok(workouts)
}

/// Totals over the period, overall and per workout type
pub async fn get_stats(
    conn: &mut SqliteConnection,
    user_id: &str,
    period: StatsPeriod,
) -> Result<WorkoutStats, Error> {
    let since = period
        .days()
        .map(|days| format_timestamp(Utc::now() - Duration::days(days)));

    let by_type: Vec<TypeStats> = sqlx::query_as(
        r#"
        SELECT type,
               COUNT(*) AS count,
               COALESCE(SUM(duration), 0) AS total_duration,
               COALESCE(SUM(distance), 0.0) AS total_distance,
               COALESCE(SUM(points), 0) AS total_points
        FROM workouts
        WHERE user_id = ? AND (? IS NULL OR performed_at >= ?)
        GROUP BY type
        ORDER BY total_points DESC, type ASC
        "#,
    )
    .bind(user_id)
    .bind(&since)
    .bind(&since)
    .fetch_all(conn)
    .await?;

    Ok(WorkoutStats {
        period,
        total_workouts: by_type.iter().map(|t| t.count).sum(),
        total_duration: by_type.iter().map(|t| t.total_duration).sum(),
        total_distance: by_type.iter().map(|t| t.total_distance).sum(),
        total_points: by_type.iter().map(|t| t.total_points).sum(),
        by_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_in_memory, WorkoutType};

    async fn insert_user(db: &SqlitePool, id: &str) {
        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, club,
                               invite_code, created_at, updated_at)
            VALUES (?, ?, 'x', 'Test', 'Athlete', 'TriClub', ?, ?, ?)
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

    fn run(duration: i64, distance: Option<f64>) -> CreateWorkoutRequest {
        CreateWorkoutRequest {
            workout_type: WorkoutType::Running,
            duration,
            distance,
            calories: Some(450),
            heart_rate: Some(152),
            notes: None,
            performed_at: None,
        }
    }

    #[test]
    fn test_validation() {
        assert!(validate(&run(42, Some(10.0))).is_ok());
        assert!(validate(&run(0, None)).is_err());
        assert!(validate(&run(MAX_DURATION_MINUTES + 1, None)).is_err());
        assert!(validate(&run(30, Some(-1.0))).is_err());
        assert!(validate(&run(30, Some(f64::NAN))).is_err());
        assert!(validate(&run(30, Some(MAX_DISTANCE_KM))).is_ok());
        assert!(validate(&run(30, Some(MAX_DISTANCE_KM + 0.1))).is_err());

        let mut req = run(30, None);
        req.heart_rate = Some(300);
        assert!(validate(&req).is_err());

        let mut req = run(30, None);
        req.performed_at = Some("yesterday".to_string());
        assert!(validate(&req).is_err());
    }

    #[tokio::test]
    async fn test_absurd_distance_earns_nothing() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1").await;

        for distance in [1e9, 1e18] {
            let err = create_workout(&db, "u1", &run(30, Some(distance)), Strategy::Continuous)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Invalid(_)));
        }

        let (balance, workouts): (i64, i64) = sqlx::query_as(
            "SELECT points, (SELECT COUNT(*) FROM workouts) FROM users WHERE id = 'u1'",
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(balance, 0);
        assert_eq!(workouts, 0);
    }

    #[tokio::test]
    async fn test_create_awards_points_through_ledger() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1").await;

        let workout = create_workout(&db, "u1", &run(42, Some(10.0)), Strategy::Continuous)
            .await
            .unwrap();
        assert_eq!(workout.points, 205);
        assert_eq!(workout.source, "auto");
        assert_eq!(workout.workout_type, "RUNNING");

        let (balance, reference): (i64, Option<String>) = sqlx::query_as(
            r#"
            SELECT u.points, h.reference FROM users u
            JOIN points_history h ON h.user_id = u.id
            WHERE u.id = 'u1'
            "#,
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(balance, 205);
        assert_eq!(reference.as_deref(), Some(workout.id.as_str()));
    }

    #[tokio::test]
    async fn test_bucketed_strategy_marks_manual() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1").await;

        let workout = create_workout(&db, "u1", &run(42, Some(10.0)), Strategy::Bucketed)
            .await
            .unwrap();
        assert_eq!(workout.points, 40);
        assert_eq!(workout.source, "manual");
    }

    #[tokio::test]
    async fn test_zero_point_workout_writes_no_entry() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1").await;

        let mut req = run(4, None);
        req.workout_type = WorkoutType::Swimming;
        let workout = create_workout(&db, "u1", &req, Strategy::Bucketed).await.unwrap();
        assert_eq!(workout.points, 0);

        let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM points_history")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let db = init_in_memory().await.unwrap();
        let err = create_workout(&db, "ghost", &run(30, None), Strategy::Continuous)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_stats_by_period() {
        let db = init_in_memory().await.unwrap();
        insert_user(&db, "u1").await;

        create_workout(&db, "u1", &run(42, Some(10.0)), Strategy::Continuous)
            .await
            .unwrap();
        let swim = CreateWorkoutRequest {
            workout_type: WorkoutType::Swimming,
            duration: 30,
            distance: Some(1.5),
            calories: None,
            heart_rate: None,
            notes: Some("Lake swim".to_string()),
            performed_at: None,
        };
        create_workout(&db, "u1", &swim, Strategy::Continuous)
            .await
            .unwrap();
        let mut old_run = run(60, Some(12.0));
        old_run.performed_at = Some(format_timestamp(Utc::now() - Duration::days(20)));
        create_workout(&db, "u1", &old_run, Strategy::Continuous)
            .await
            .unwrap();

        let mut conn = db.acquire().await.unwrap();
        let week = get_stats(&mut conn, "u1", StatsPeriod::Week).await.unwrap();
        assert_eq!(week.total_workouts, 2);
        assert_eq!(week.total_duration, 72);
        assert_eq!(week.total_points, 205 + 135);
        assert!((week.total_distance - 11.5).abs() < 1e-9);
        assert_eq!(week.by_type.len(), 2);
        assert_eq!(week.by_type[0].workout_type, "RUNNING");

        let month = get_stats(&mut conn, "u1", StatsPeriod::Month).await.unwrap();
        assert_eq!(month.total_workouts, 3);
        assert_eq!(month.by_type[0].count, 2);

        let listed = list_workouts(&mut conn, Some("u1"), None).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[2].duration, 60);
    }
}
