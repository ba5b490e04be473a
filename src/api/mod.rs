pub mod auth;
pub mod error;
mod invitations;
mod marketplace;
pub mod metrics;
mod points;
pub mod rate_limit;
mod register;
mod store;
pub mod validation;
mod workouts;

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public, credential-bearing routes get the stricter limit
    let auth_routes = Router::new()
        .route("/register", post(register::register))
        .route("/auth/login", post(auth::login))
        .route("/invitations/register", post(register::register))
        .route(
            "/invitations/validate/:code",
            get(invitations::validate_invitation),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let api_routes = Router::new()
        // Session
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Points
        .route("/points/balance", get(points::get_balance))
        .route("/points/history", get(points::get_history))
        .route("/points/add", post(points::add_points))
        .route("/points/spend", post(points::spend_points))
        // Invitations
        .route(
            "/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        )
        // Store
        .route("/store/cart", get(store::get_cart).post(store::add_to_cart))
        .route("/store/cart/:product_id", put(store::update_cart_item))
        .route(
            "/store/orders",
            get(store::list_orders).post(store::create_order),
        )
        // Workouts
        .route(
            "/workouts",
            get(workouts::list_workouts).post(workouts::create_workout),
        )
        .route("/workouts/stats", get(workouts::get_stats))
        .route(
            "/admin/workouts",
            get(workouts::admin_list_workouts).post(workouts::admin_create_workout),
        )
        // Marketplace
        .route(
            "/marketplace/products",
            get(marketplace::list_products).post(marketplace::create_product),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api", auth_routes.merge(api_routes))
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
