//! Department handlers.

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
use crate::models::department::Department;
use crate::models::unit::Unit;
use crate::services::visibility::CallerContext;

/// Create department routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_departments).post(create_department))
        .route(
            "/:id",
            get(get_department)
                .patch(rename_department)
                .delete(delete_department),
        )
        .route("/:id/restore", post(restore_department))
        .route("/:id/permanent", delete(hard_delete_department))
        .route("/:id/units", get(list_department_units))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentRequest {
    pub description: String,
}

/// List departments visible to the caller
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/departments",
    tag = "departments",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of departments", body = Page<Department>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_departments(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Department>>> {
    let departments = state
        .directory
        .list_departments(&caller, &query.filter())
        .await?;
    let paging = query.pagination();
    Ok(Json(paginate(
        departments,
        paging.page(),
        state.per_page(&paging),
    )))
}

/// Get a department
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/departments",
    tag = "departments",
    params(("id" = Uuid, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department", body = Department),
        (status = 404, description = "Not found or not visible", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_department(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Department>> {
    Ok(Json(state.directory.get_department(&caller, id).await?))
}

/// Create a department
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/departments",
    tag = "departments",
    request_body = DepartmentRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Description already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Json(payload): Json<DepartmentRequest>,
) -> Result<(StatusCode, Json<Department>)> {
    let department = state
        .directory
        .create_department(&caller, &payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(department)))
}

/// Rename a department
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/departments",
    tag = "departments",
    params(("id" = Uuid, Path, description = "Department ID")),
    request_body = DepartmentRequest,
    responses(
        (status = 200, description = "Department renamed", body = Department),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_department(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DepartmentRequest>,
) -> Result<Json<Department>> {
    let department = state
        .directory
        .rename_department(&caller, id, &payload.description)
        .await?;
    Ok(Json(department))
}

/// Soft-delete a department with its units, users and unit grants
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/departments",
    tag = "departments",
    params(("id" = Uuid, Path, description = "Department ID")),
    responses(
        (status = 204, description = "Department deleted"),
        (status = 409, description = "Cascade would delete the caller", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_department(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.directory.delete_department(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted department and what its deletion removed
#[utoipa::path(
    post,
    path = "/{id}/restore",
    context_path = "/api/v1/departments",
    tag = "departments",
    params(("id" = Uuid, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department restored", body = Department),
    ),
    security(("bearer_auth" = []))
)]
pub async fn restore_department(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Department>> {
    Ok(Json(state.directory.restore_department(&caller, id).await?))
}

/// Permanently remove a department and everything below it
#[utoipa::path(
    delete,
    path = "/{id}/permanent",
    context_path = "/api/v1/departments",
    tag = "departments",
    params(("id" = Uuid, Path, description = "Department ID")),
    responses(
        (status = 204, description = "Department removed"),
        (status = 403, description = "SuperAdmin required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn hard_delete_department(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.directory.hard_delete_department(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Units of a department visible to the caller
#[utoipa::path(
    get,
    path = "/{id}/units",
    context_path = "/api/v1/departments",
    tag = "departments",
    params(("id" = Uuid, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Units", body = Vec<Unit>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_department_units(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Unit>>> {
    Ok(Json(state.directory.units_of_department(&caller, id).await?))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_departments,
        get_department,
        create_department,
        rename_department,
        delete_department,
        restore_department,
        hard_delete_department,
        list_department_units,
    ),
    components(schemas(DepartmentRequest, Department))
)]
pub struct DepartmentsApiDoc;
