//! CSV export handlers.

use axum::{
    extract::{Extension, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

use crate::api::download_response::DownloadResponse;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::services::export_service::Language;
use crate::services::visibility::CallerContext;

/// Create export routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users.csv", get(export_users))
        .route("/grants.csv", get(export_grants))
        .route("/accesses.csv", get(export_accesses))
        .route("/org-chart.csv", get(export_org_chart))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// `en` or `bg`; defaults to the configured display language
    pub lang: Option<String>,
    /// Limit grants to one user
    pub user_id: Option<Uuid>,
    /// Limit the access tree to one information system
    pub information_system_id: Option<Uuid>,
}

impl ExportQuery {
    fn language(&self, default: Language) -> Result<Language> {
        match self.lang.as_deref() {
            None => Ok(default),
            Some(value) => Language::parse(value).ok_or_else(|| {
                AppError::Validation(format!("Unsupported language '{}'", value))
            }),
        }
    }
}

/// Export visible users
#[utoipa::path(
    get,
    path = "/users.csv",
    context_path = "/api/v1/export",
    tag = "export",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 400, description = "Unsupported language", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_users(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ExportQuery>,
) -> Result<DownloadResponse> {
    let lang = query.language(state.config.display_language)?;
    let body = state.export.users_csv(&caller, lang).await?;
    Ok(DownloadResponse::csv(body, format!("users-{}.csv", lang.code())))
}

/// Export access grants, optionally for one user
#[utoipa::path(
    get,
    path = "/grants.csv",
    context_path = "/api/v1/export",
    tag = "export",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_grants(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ExportQuery>,
) -> Result<DownloadResponse> {
    let lang = query.language(state.config.display_language)?;
    let body = state
        .export
        .grants_csv(&caller, lang, query.user_id)
        .await?;
    Ok(DownloadResponse::csv(body, format!("grants-{}.csv", lang.code())))
}

/// Export access trees
#[utoipa::path(
    get,
    path = "/accesses.csv",
    context_path = "/api/v1/export",
    tag = "export",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_accesses(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ExportQuery>,
) -> Result<DownloadResponse> {
    let lang = query.language(state.config.display_language)?;
    let body = state
        .export
        .access_tree_csv(&caller, lang, query.information_system_id)
        .await?;
    Ok(DownloadResponse::csv(
        body,
        format!("accesses-{}.csv", lang.code()),
    ))
}

/// Export departments and units with user counts
#[utoipa::path(
    get,
    path = "/org-chart.csv",
    context_path = "/api/v1/export",
    tag = "export",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn export_org_chart(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ExportQuery>,
) -> Result<DownloadResponse> {
    let lang = query.language(state.config.display_language)?;
    let body = state.export.org_chart_csv(&caller, lang).await?;
    Ok(DownloadResponse::csv(
        body,
        format!("org-chart-{}.csv", lang.code()),
    ))
}

#[derive(OpenApi)]
#[openapi(paths(export_users, export_grants, export_accesses, export_org_chart))]
pub struct ExportApiDoc;
