//! Route definitions for the API.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Json, Router};

use super::handlers;
use super::middleware::auth::auth_middleware;
use super::middleware::security_headers::security_headers_middleware;
use super::middleware::tracing::correlation_id_middleware;
use super::SharedState;

/// JSON request bodies
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// CSV uploads for bulk import
const IMPORT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    // Build OpenAPI spec once at startup
    let openapi = super::openapi::build_openapi();

    Router::new()
        // Health endpoints (no auth required)
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route(
            "/api/v1/openapi.json",
            get(move || async move { Json(openapi) }),
        )
        .nest("/api/v1", api_v1_routes(state.clone()))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(correlation_id_middleware))
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes(state: SharedState) -> Router<SharedState> {
    let auth_service = state.auth.clone();

    let protected = Router::new()
        .nest("/auth", handlers::auth::protected_router())
        .nest("/departments", handlers::departments::router())
        .nest("/units", handlers::units::router())
        .nest("/users", handlers::users::router())
        .nest(
            "/information-systems",
            handlers::information_systems::router(),
        )
        .nest("/accesses", handlers::accesses::router())
        .nest("/directives", handlers::directives::router())
        .nest("/logs", handlers::logs::router())
        .nest("/export", handlers::export::router())
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .nest(
            "/admin",
            handlers::admin::router().layer(DefaultBodyLimit::max(IMPORT_BODY_LIMIT)),
        )
        .layer(middleware::from_fn_with_state(auth_service, auth_middleware));

    Router::new()
        // Login and logout work without a session
        .nest(
            "/auth",
            handlers::auth::public_router().layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        )
        .merge(protected)
}
