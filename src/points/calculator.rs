//! Workout points calculation.
//!
//! Two strategies exist. `Continuous` scales linearly with time and distance
//! and is used for workouts members log themselves. `Bucketed` pays a fixed
//! amount per completed block of minutes and is used for manual entry by
//! administrators, where distance is often unknown.

use serde::{Deserialize, Serialize};

use crate::db::WorkoutType;

/// Strategy used to turn a workout into points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Continuous,
    Bucketed,
}

impl Strategy {
    pub fn calculate(&self, workout_type: WorkoutType, duration_seconds: f64, distance_meters: f64) -> i64 {
        match self {
            Strategy::Continuous => calculate_points(workout_type, duration_seconds, distance_meters),
            Strategy::Bucketed => calculate_bucketed_points(workout_type, duration_seconds),
        }
    }
}

/// Per-minute and per-kilometre rates for the continuous strategy
fn continuous_rates(workout_type: WorkoutType) -> (f64, f64) {
    match workout_type {
        WorkoutType::Swimming => (2.0, 50.0),
        WorkoutType::Cycling => (1.5, 3.0),
        WorkoutType::Running => (2.5, 10.0),
        WorkoutType::Triathlon => (3.0, 15.0),
        _ => (1.0, 0.0),
    }
}

/// Minutes per bucket and points per completed bucket
fn bucket_rates(workout_type: WorkoutType) -> (i64, i64) {
    match workout_type {
        WorkoutType::Swimming => (10, 10),
        WorkoutType::Cycling => (15, 10),
        WorkoutType::Running => (5, 5),
        WorkoutType::Triathlon => (8, 10),
        _ => (10, 5),
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Continuous strategy: `floor(minutes * rate + km * rate)`
pub fn calculate_points(workout_type: WorkoutType, duration_seconds: f64, distance_meters: f64) -> i64 {
    let minutes = sanitize(duration_seconds) / 60.0;
    let km = sanitize(distance_meters) / 1000.0;
    let (per_minute, per_km) = continuous_rates(workout_type);

    (minutes * per_minute + km * per_km).floor() as i64
}

/// Bucketed strategy: fixed points per completed bucket of minutes
pub fn calculate_bucketed_points(workout_type: WorkoutType, duration_seconds: f64) -> i64 {
    let minutes = (sanitize(duration_seconds) / 60.0).floor() as i64;
    let (bucket_minutes, per_bucket) = bucket_rates(workout_type);

    (minutes / bucket_minutes) * per_bucket
}
