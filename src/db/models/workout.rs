//! Workout models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkoutType {
    Swimming,
    Cycling,
    Running,
    Triathlon,
    Strength,
    Yoga,
    Other,
}

impl WorkoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutType::Swimming => "SWIMMING",
            WorkoutType::Cycling => "CYCLING",
            WorkoutType::Running => "RUNNING",
            WorkoutType::Triathlon => "TRIATHLON",
            WorkoutType::Strength => "STRENGTH",
            WorkoutType::Yoga => "YOGA",
            WorkoutType::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkoutType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SWIMMING" => Ok(WorkoutType::Swimming),
            "CYCLING" => Ok(WorkoutType::Cycling),
            "RUNNING" => Ok(WorkoutType::Running),
            "TRIATHLON" => Ok(WorkoutType::Triathlon),
            "STRENGTH" => Ok(WorkoutType::Strength),
            "YOGA" => Ok(WorkoutType::Yoga),
            "OTHER" => Ok(WorkoutType::Other),
            _ => Err(format!("Unknown workout type: {}", s)),
        }
    }
}

/// How a workout entered the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutSource {
    /// Logged by the member, points from the continuous formula
    Auto,
    /// Entered by an administrator, points from time buckets
    Manual,
}

impl WorkoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutSource::Auto => "auto",
            WorkoutSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: String,
    pub user_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub workout_type: String,
    /// Minutes
    pub duration: i64,
    /// Kilometres
    pub distance: Option<f64>,
    pub calories: Option<i64>,
    pub heart_rate: Option<i64>,
    pub points: i64,
    pub source: String,
    pub notes: Option<String>,
    pub performed_at: String,
    pub created_at: String,
}

/// Workout submitted by a member
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkoutRequest {
    #[serde(rename = "type")]
    pub workout_type: WorkoutType,
    /// Minutes
    pub duration: i64,
    /// Kilometres
    pub distance: Option<f64>,
    pub calories: Option<i64>,
    pub heart_rate: Option<i64>,
    pub notes: Option<String>,
    /// RFC 3339, defaults to now
    pub performed_at: Option<String>,
}

/// Workout entered by an administrator on behalf of a member
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateWorkoutRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub workout: CreateWorkoutRequest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminWorkoutQuery {
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl StatsPeriod {
    /// Length of the period in days, `None` for all time
    pub fn days(&self) -> Option<i64> {
        match self {
            StatsPeriod::Week => Some(7),
            StatsPeriod::Month => Some(30),
            StatsPeriod::Year => Some(365),
            StatsPeriod::All => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub period: StatsPeriod,
}

/// Aggregates for one workout type
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TypeStats {
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub workout_type: String,
    pub count: i64,
    pub total_duration: i64,
    pub total_distance: f64,
    pub total_points: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStats {
    pub period: StatsPeriod,
    pub total_workouts: i64,
    pub total_duration: i64,
    pub total_distance: f64,
    pub total_points: i64,
    pub by_type: Vec<TypeStats>,
}
