//! Audit log handlers.

use axum::{
    extract::{Extension, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::dto::{Page, Pagination, PaginationQuery};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::log::{LogAction, LogEntry};
use crate::models::user::AuthorityLevel;
use crate::services::visibility::{CallerContext, Capability};

/// Create audit log routes
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(list_logs).delete(purge_logs))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    pub removed: u64,
}

/// List audit log entries, newest first
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/logs",
    tag = "logs",
    params(PaginationQuery),
    responses(
        (status = 200, description = "One page of log entries", body = Page<LogEntry>),
        (status = 403, description = "Full reading access required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_logs(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<LogEntry>>> {
    caller.require_level(Capability::Read, AuthorityLevel::Full)?;

    let per_page = state.per_page(&query);
    let offset = Pagination::new(query.page(), per_page, 0).offset();
    let (entries, total) = state.audit.query(offset, per_page as i64).await?;
    Ok(Json(Page::from_parts(
        entries,
        Pagination::new(query.page(), per_page, total),
    )))
}

/// Remove every log entry
#[utoipa::path(
    delete,
    path = "",
    context_path = "/api/v1/logs",
    tag = "logs",
    responses(
        (status = 200, description = "Log purged", body = PurgeResponse),
        (status = 403, description = "SuperAdmin required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn purge_logs(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<PurgeResponse>> {
    caller.require_super_admin()?;

    let removed = state.audit.purge().await?;
    // The purge itself stays on record
    state
        .audit
        .record(
            &caller,
            LogAction::HardDelete,
            format!("Purged {} log entries", removed),
        )
        .await;
    Ok(Json(PurgeResponse { removed }))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_logs, purge_logs),
    components(schemas(LogEntry, LogAction, PurgeResponse))
)]
pub struct LogsApiDoc;
