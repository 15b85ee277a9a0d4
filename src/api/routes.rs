use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::auth::auth_routes;
use super::health::health_check;
use super::members::member_routes;
use super::owners::owner_routes;
use super::platform_admin::platform_admin_routes;
use super::staff::staff_routes;
use super::trainers::trainer_routes;
use super::AppState;
use crate::auth::{cors_layer, security_headers_layer};

pub fn create_routes(state: AppState) -> Router {
    let api_v1 = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/owners", owner_routes(state.clone()))
        .nest("/staff", staff_routes(state.clone()))
        .nest("/trainers", trainer_routes(state.clone()))
        .nest("/members", member_routes(state.clone()))
        .nest("/platform_admin", platform_admin_routes(state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers_layer())
        .layer(cors_layer())
}
