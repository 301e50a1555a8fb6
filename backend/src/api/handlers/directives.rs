//! Directive ledger handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{paginate, ListQuery, Page};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::directive::Directive;
use crate::services::visibility::CallerContext;

/// Create directive routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_directives).post(create_directive))
        .route(
            "/:id",
            get(get_directive)
                .patch(rename_directive)
                .delete(delete_directive),
        )
        .route("/:id/restore", post(restore_directive))
        .route("/:id/permanent", delete(hard_delete_directive))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectiveNameRequest {
    pub name: String,
}

/// List directives
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/directives",
    tag = "directives",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of directives", body = Page<Directive>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_directives(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Directive>>> {
    let directives = state
        .catalog
        .list_directives(&caller, &query.filter())
        .await?;
    let paging = query.pagination();
    Ok(Json(paginate(
        directives,
        paging.page(),
        state.per_page(&paging),
    )))
}

/// Get a directive
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/directives",
    tag = "directives",
    params(("id" = Uuid, Path, description = "Directive ID")),
    responses(
        (status = 200, description = "Directive", body = Directive),
        (status = 404, description = "Not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_directive(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Directive>> {
    Ok(Json(state.catalog.get_directive(&caller, id).await?))
}

/// Register a directive
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/directives",
    tag = "directives",
    request_body = DirectiveNameRequest,
    responses(
        (status = 201, description = "Directive created", body = Directive),
        (status = 409, description = "Name already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_directive(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Json(payload): Json<DirectiveNameRequest>,
) -> Result<(StatusCode, Json<Directive>)> {
    let directive = state
        .catalog
        .create_directive(&caller, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(directive)))
}

/// Rename a directive
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/directives",
    tag = "directives",
    params(("id" = Uuid, Path, description = "Directive ID")),
    request_body = DirectiveNameRequest,
    responses(
        (status = 200, description = "Directive renamed", body = Directive),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_directive(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DirectiveNameRequest>,
) -> Result<Json<Directive>> {
    let directive = state
        .catalog
        .rename_directive(&caller, id, &payload.name)
        .await?;
    Ok(Json(directive))
}

/// Soft-delete a directive; existing grants keep referencing it
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/directives",
    tag = "directives",
    params(("id" = Uuid, Path, description = "Directive ID")),
    responses(
        (status = 204, description = "Directive deleted"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_directive(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.catalog.delete_directive(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted directive
#[utoipa::path(
    post,
    path = "/{id}/restore",
    context_path = "/api/v1/directives",
    tag = "directives",
    params(("id" = Uuid, Path, description = "Directive ID")),
    responses(
        (status = 200, description = "Directive restored", body = Directive),
    ),
    security(("bearer_auth" = []))
)]
pub async fn restore_directive(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Directive>> {
    Ok(Json(state.catalog.restore_directive(&caller, id).await?))
}

/// Permanently remove an unreferenced directive
#[utoipa::path(
    delete,
    path = "/{id}/permanent",
    context_path = "/api/v1/directives",
    tag = "directives",
    params(("id" = Uuid, Path, description = "Directive ID")),
    responses(
        (status = 204, description = "Directive removed"),
        (status = 403, description = "SuperAdmin required", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Referenced by grants", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn hard_delete_directive(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.catalog.hard_delete_directive(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_directives,
        get_directive,
        create_directive,
        rename_directive,
        delete_directive,
        restore_directive,
        hard_delete_directive,
    ),
    components(schemas(DirectiveNameRequest, Directive))
)]
pub struct DirectivesApiDoc;
