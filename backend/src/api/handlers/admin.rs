//! Admin handlers (bulk import, data reset).

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::services::import_service::{ImportError, ImportReport};
use crate::services::visibility::CallerContext;

/// Create admin routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/import/users", post(import_users))
        .route("/import/accesses", post(import_accesses))
        .route("/reset", post(reset))
}

fn require_body(body: &Bytes) -> Result<()> {
    if body.is_empty() {
        return Err(AppError::Validation("CSV body is empty".to_string()));
    }
    Ok(())
}

/// Import users from CSV, creating departments and units as needed
#[utoipa::path(
    post,
    path = "/import/users",
    context_path = "/api/v1/admin",
    tag = "admin",
    request_body(content = String, content_type = "text/csv",
        description = "username,first_name,last_name,department,unit,position"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 403, description = "SuperAdmin required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn import_users(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    body: Bytes,
) -> Result<Json<ImportReport>> {
    require_body(&body)?;
    Ok(Json(state.import.import_users(&caller, &body).await?))
}

/// Import access paths from CSV, creating systems and missing path segments
#[utoipa::path(
    post,
    path = "/import/accesses",
    context_path = "/api/v1/admin",
    tag = "admin",
    request_body(content = String, content_type = "text/csv",
        description = "information_system,path"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 403, description = "SuperAdmin required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn import_accesses(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    body: Bytes,
) -> Result<Json<ImportReport>> {
    require_body(&body)?;
    Ok(Json(state.import.import_accesses(&caller, &body).await?))
}

/// Wipe all data except the caller, its unit and department
#[utoipa::path(
    post,
    path = "/reset",
    context_path = "/api/v1/admin",
    tag = "admin",
    responses(
        (status = 204, description = "Data reset"),
        (status = 403, description = "SuperAdmin required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn reset(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<StatusCode> {
    state.import.reset(&caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(import_users, import_accesses, reset),
    components(schemas(ImportReport, ImportError))
)]
pub struct AdminApiDoc;
