//! Access hierarchy handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{paginate, ListQuery, Page};
use crate::api::SharedState;
use crate::error::Result;
use crate::services::catalog_service::{AccessView, CreateAccessRequest};
use crate::services::grant_service::GrantView;
use crate::services::visibility::CallerContext;

/// Create access routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_accesses).post(create_access))
        .route(
            "/:id",
            get(get_access).patch(rename_access).delete(delete_access),
        )
        .route("/:id/children", get(list_children))
        .route("/:id/move", post(move_access))
        .route("/:id/grants", get(list_access_grants))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccessListQuery {
    /// Limit to one information system
    pub information_system_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Case-insensitive match on the full path
    pub search: Option<String>,
}

impl AccessListQuery {
    fn list(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            per_page: self.per_page,
            search: self.search.clone(),
            include_deleted: false,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameAccessRequest {
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveAccessRequest {
    /// New parent within the same system; null makes the access a root
    pub parent_access_id: Option<Uuid>,
}

/// List accesses with their full paths
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/accesses",
    tag = "accesses",
    params(AccessListQuery),
    responses(
        (status = 200, description = "One page of accesses", body = Page<AccessView>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_accesses(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<AccessListQuery>,
) -> Result<Json<Page<AccessView>>> {
    let list = query.list();
    let accesses = state
        .catalog
        .list_accesses(&caller, query.information_system_id, &list.filter())
        .await?;
    let paging = list.pagination();
    Ok(Json(paginate(accesses, paging.page(), state.per_page(&paging))))
}

/// Get an access
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/accesses",
    tag = "accesses",
    params(("id" = Uuid, Path, description = "Access ID")),
    responses(
        (status = 200, description = "Access", body = AccessView),
        (status = 404, description = "Not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_access(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccessView>> {
    Ok(Json(state.catalog.get_access(&caller, id).await?))
}

/// Create a root access or a child of an existing access
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/accesses",
    tag = "accesses",
    request_body = CreateAccessRequest,
    responses(
        (status = 201, description = "Access created", body = AccessView),
        (status = 400, description = "Parent belongs to another system", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Description already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_access(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Json(payload): Json<CreateAccessRequest>,
) -> Result<(StatusCode, Json<AccessView>)> {
    let access = state.catalog.create_access(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(access)))
}

/// Rename an access
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/accesses",
    tag = "accesses",
    params(("id" = Uuid, Path, description = "Access ID")),
    request_body = RenameAccessRequest,
    responses(
        (status = 200, description = "Access renamed", body = AccessView),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_access(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenameAccessRequest>,
) -> Result<Json<AccessView>> {
    let access = state
        .catalog
        .rename_access(&caller, id, &payload.description)
        .await?;
    Ok(Json(access))
}

/// Delete a leaf access that was never granted
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/accesses",
    tag = "accesses",
    params(("id" = Uuid, Path, description = "Access ID")),
    responses(
        (status = 204, description = "Access deleted"),
        (status = 409, description = "Has children or grants", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_access(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.catalog.delete_access(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Direct children of an access
#[utoipa::path(
    get,
    path = "/{id}/children",
    context_path = "/api/v1/accesses",
    tag = "accesses",
    params(("id" = Uuid, Path, description = "Access ID")),
    responses(
        (status = 200, description = "Children", body = Vec<AccessView>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_children(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AccessView>>> {
    Ok(Json(state.catalog.children_of_access(&caller, id).await?))
}

/// Move an access under another parent
#[utoipa::path(
    post,
    path = "/{id}/move",
    context_path = "/api/v1/accesses",
    tag = "accesses",
    params(("id" = Uuid, Path, description = "Access ID")),
    request_body = MoveAccessRequest,
    responses(
        (status = 200, description = "Access moved", body = AccessView),
        (status = 422, description = "Move would create a cycle", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn move_access(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveAccessRequest>,
) -> Result<Json<AccessView>> {
    let access = state
        .catalog
        .move_access(&caller, id, payload.parent_access_id)
        .await?;
    Ok(Json(access))
}

/// Users holding or having held an access
#[utoipa::path(
    get,
    path = "/{id}/grants",
    context_path = "/api/v1/accesses",
    tag = "grants",
    params(("id" = Uuid, Path, description = "Access ID")),
    responses(
        (status = 200, description = "Grant rows of visible users", body = Vec<GrantView>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_access_grants(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GrantView>>> {
    Ok(Json(state.grants.grants_of_access(&caller, id).await?))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_accesses,
        get_access,
        create_access,
        rename_access,
        delete_access,
        list_children,
        move_access,
        list_access_grants,
    ),
    components(schemas(
        AccessView,
        CreateAccessRequest,
        RenameAccessRequest,
        MoveAccessRequest,
    ))
)]
pub struct AccessesApiDoc;
