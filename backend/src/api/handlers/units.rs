//! Unit handlers.

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
use crate::models::unit::Unit;
use crate::models::user::User;
use crate::services::visibility::CallerContext;

/// Create unit routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_units).post(create_unit))
        .route("/:id", get(get_unit).patch(rename_unit).delete(delete_unit))
        .route("/:id/restore", post(restore_unit))
        .route("/:id/permanent", delete(hard_delete_unit))
        .route("/:id/users", get(list_unit_users))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUnitRequest {
    pub department_id: Uuid,
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameUnitRequest {
    pub description: String,
}

/// List units visible to the caller
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/units",
    tag = "units",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of units", body = Page<Unit>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_units(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Unit>>> {
    let units = state.directory.list_units(&caller, &query.filter()).await?;
    let paging = query.pagination();
    Ok(Json(paginate(units, paging.page(), state.per_page(&paging))))
}

/// Get a unit
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/units",
    tag = "units",
    params(("id" = Uuid, Path, description = "Unit ID")),
    responses(
        (status = 200, description = "Unit", body = Unit),
        (status = 404, description = "Not found or not visible", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Unit>> {
    Ok(Json(state.directory.get_unit(&caller, id).await?))
}

/// Create a unit inside a department
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/units",
    tag = "units",
    request_body = CreateUnitRequest,
    responses(
        (status = 201, description = "Unit created", body = Unit),
        (status = 409, description = "Description already used in the department", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Json(payload): Json<CreateUnitRequest>,
) -> Result<(StatusCode, Json<Unit>)> {
    let unit = state
        .directory
        .create_unit(&caller, payload.department_id, &payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

/// Rename a unit
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/units",
    tag = "units",
    params(("id" = Uuid, Path, description = "Unit ID")),
    request_body = RenameUnitRequest,
    responses(
        (status = 200, description = "Unit renamed", body = Unit),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenameUnitRequest>,
) -> Result<Json<Unit>> {
    let unit = state
        .directory
        .rename_unit(&caller, id, &payload.description)
        .await?;
    Ok(Json(unit))
}

/// Soft-delete a unit with its users and unit grants
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/units",
    tag = "units",
    params(("id" = Uuid, Path, description = "Unit ID")),
    responses(
        (status = 204, description = "Unit deleted"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.directory.delete_unit(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted unit
#[utoipa::path(
    post,
    path = "/{id}/restore",
    context_path = "/api/v1/units",
    tag = "units",
    params(("id" = Uuid, Path, description = "Unit ID")),
    responses(
        (status = 200, description = "Unit restored", body = Unit),
        (status = 409, description = "Department is deleted", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn restore_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Unit>> {
    Ok(Json(state.directory.restore_unit(&caller, id).await?))
}

/// Permanently remove a unit and its users
#[utoipa::path(
    delete,
    path = "/{id}/permanent",
    context_path = "/api/v1/units",
    tag = "units",
    params(("id" = Uuid, Path, description = "Unit ID")),
    responses(
        (status = 204, description = "Unit removed"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn hard_delete_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.directory.hard_delete_unit(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Users placed in a unit
#[utoipa::path(
    get,
    path = "/{id}/users",
    context_path = "/api/v1/units",
    tag = "units",
    params(("id" = Uuid, Path, description = "Unit ID")),
    responses(
        (status = 200, description = "Users", body = Vec<User>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_unit_users(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.directory.users_of_unit(&caller, id).await?))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_units,
        get_unit,
        create_unit,
        rename_unit,
        delete_unit,
        restore_unit,
        hard_delete_unit,
        list_unit_users,
    ),
    components(schemas(CreateUnitRequest, RenameUnitRequest, Unit))
)]
pub struct UnitsApiDoc;
