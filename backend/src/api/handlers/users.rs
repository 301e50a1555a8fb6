//! User directory handlers, including unit grants and access grants.

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
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::{AuthorityLevel, User};
use crate::models::user_access::UserAccess;
use crate::services::directory_service::{CreateUserRequest, UpdateUserRequest};
use crate::services::grant_service::{GrantState, GrantView};
use crate::services::visibility::CallerContext;

/// Create user routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/:id/restore", post(restore_user))
        .route("/:id/permanent", delete(hard_delete_user))
        .route("/:id/units", get(list_unit_grants))
        .route("/:id/units/available", get(list_available_units))
        .route("/:id/units/:unit_id", post(grant_unit).delete(revoke_unit))
        .route("/:id/accesses", get(list_user_grants))
        .route(
            "/:id/accesses/:access_id",
            get(get_grant_state).post(grant_access),
        )
        .route("/:id/accesses/:access_id/revoke", post(revoke_access))
}

/// Directive justifying a grant or revocation
#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectiveRequest {
    pub directive_id: Uuid,
}

/// List users visible to the caller
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of users", body = Page<User>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<User>>> {
    let users = state.directory.list_users(&caller, &query.filter()).await?;
    let paging = query.pagination();
    Ok(Json(paginate(users, paging.page(), state.per_page(&paging))))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Not found or not visible", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    Ok(Json(state.directory.get_user(&caller, id).await?))
}

/// Create user
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed", body = crate::api::openapi::ErrorResponse),
        (status = 403, description = "Outside the caller's write scope", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Username already exists", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.directory.create_user(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update user details, placement, authority or password
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    Ok(Json(state.directory.update_user(&caller, id, payload).await?))
}

/// Soft-delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.directory.delete_user(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Restore a soft-deleted user
#[utoipa::path(
    post,
    path = "/{id}/restore",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User restored", body = User),
        (status = 409, description = "Placement unit is deleted", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn restore_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    Ok(Json(state.directory.restore_user(&caller, id).await?))
}

/// Permanently remove a user with its grants
#[utoipa::path(
    delete,
    path = "/{id}/permanent",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User removed"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn hard_delete_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.directory.hard_delete_user(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Units granted to a user
#[utoipa::path(
    get,
    path = "/{id}/units",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Granted units", body = Vec<Unit>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_unit_grants(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Unit>>> {
    Ok(Json(state.directory.unit_grants_of_user(&caller, id).await?))
}

/// Units the caller could still grant to a user
#[utoipa::path(
    get,
    path = "/{id}/units/available",
    context_path = "/api/v1/users",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Grantable units", body = Vec<Unit>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_available_units(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Unit>>> {
    Ok(Json(state.directory.available_units(&caller, id).await?))
}

/// Grant a unit to a user
#[utoipa::path(
    post,
    path = "/{id}/units/{unit_id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("unit_id" = Uuid, Path, description = "Unit ID"),
    ),
    responses(
        (status = 200, description = "Unit granted", body = UnitUser),
    ),
    security(("bearer_auth" = []))
)]
pub async fn grant_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path((id, unit_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<UnitUser>> {
    Ok(Json(state.directory.grant_unit(&caller, id, unit_id).await?))
}

/// Revoke a unit grant
#[utoipa::path(
    delete,
    path = "/{id}/units/{unit_id}",
    context_path = "/api/v1/users",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("unit_id" = Uuid, Path, description = "Unit ID"),
    ),
    responses(
        (status = 204, description = "Unit grant revoked"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_unit(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path((id, unit_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    state.directory.revoke_unit(&caller, id, unit_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Access grants of a user, active first
#[utoipa::path(
    get,
    path = "/{id}/accesses",
    context_path = "/api/v1/users",
    tag = "grants",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Grant rows", body = Vec<GrantView>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_user_grants(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GrantView>>> {
    Ok(Json(state.grants.grants_of_user(&caller, id).await?))
}

/// Grant state of one user/access pair
#[utoipa::path(
    get,
    path = "/{id}/accesses/{access_id}",
    context_path = "/api/v1/users",
    tag = "grants",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("access_id" = Uuid, Path, description = "Access ID"),
    ),
    responses(
        (status = 200, description = "Grant state", body = GrantState),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_grant_state(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path((id, access_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GrantState>> {
    Ok(Json(state.grants.state(&caller, id, access_id).await?))
}

/// Grant an access under a directive
#[utoipa::path(
    post,
    path = "/{id}/accesses/{access_id}",
    context_path = "/api/v1/users",
    tag = "grants",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("access_id" = Uuid, Path, description = "Access ID"),
    ),
    request_body = DirectiveRequest,
    responses(
        (status = 200, description = "Access granted", body = UserAccess),
        (status = 400, description = "Directive is deleted", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn grant_access(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path((id, access_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DirectiveRequest>,
) -> Result<Json<UserAccess>> {
    let row = state
        .grants
        .grant(&caller, id, access_id, payload.directive_id)
        .await?;
    Ok(Json(row))
}

/// Revoke an access under a directive
#[utoipa::path(
    post,
    path = "/{id}/accesses/{access_id}/revoke",
    context_path = "/api/v1/users",
    tag = "grants",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("access_id" = Uuid, Path, description = "Access ID"),
    ),
    request_body = DirectiveRequest,
    responses(
        (status = 200, description = "Access revoked", body = UserAccess),
        (status = 404, description = "Never granted", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Already revoked", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn revoke_access(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path((id, access_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<DirectiveRequest>,
) -> Result<Json<UserAccess>> {
    let row = state
        .grants
        .revoke(&caller, id, access_id, payload.directive_id)
        .await?;
    Ok(Json(row))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_users,
        get_user,
        create_user,
        update_user,
        delete_user,
        restore_user,
        hard_delete_user,
        list_unit_grants,
        list_available_units,
        grant_unit,
        revoke_unit,
        list_user_grants,
        get_grant_state,
        grant_access,
        revoke_access,
    ),
    components(schemas(
        User,
        AuthorityLevel,
        CreateUserRequest,
        UpdateUserRequest,
        UnitUser,
        DirectiveRequest,
        UserAccess,
        GrantView,
        GrantState,
    ))
)]
pub struct UsersApiDoc;
