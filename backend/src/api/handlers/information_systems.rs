//! Information system handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::information_system::InformationSystem;
use crate::services::catalog_service::AccessView;
use crate::services::directory_service::ListFilter;
use crate::services::visibility::CallerContext;

/// Create information system routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/",
            get(list_information_systems).post(create_information_system),
        )
        .route(
            "/:id",
            get(get_information_system)
                .patch(rename_information_system)
                .delete(delete_information_system),
        )
        .route("/:id/accesses", get(list_system_accesses))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InformationSystemRequest {
    pub name: String,
}

/// List information systems
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/information-systems",
    tag = "information_systems",
    responses(
        (status = 200, description = "Information systems by name", body = Vec<InformationSystem>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_information_systems(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Vec<InformationSystem>>> {
    Ok(Json(state.catalog.list_information_systems(&caller).await?))
}

/// Get an information system
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/information-systems",
    tag = "information_systems",
    params(("id" = Uuid, Path, description = "Information system ID")),
    responses(
        (status = 200, description = "Information system", body = InformationSystem),
        (status = 404, description = "Not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_information_system(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<InformationSystem>> {
    Ok(Json(state.catalog.get_information_system(&caller, id).await?))
}

/// Create an information system
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/information-systems",
    tag = "information_systems",
    request_body = InformationSystemRequest,
    responses(
        (status = 201, description = "Information system created", body = InformationSystem),
        (status = 409, description = "Name already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_information_system(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Json(payload): Json<InformationSystemRequest>,
) -> Result<(StatusCode, Json<InformationSystem>)> {
    let system = state
        .catalog
        .create_information_system(&caller, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(system)))
}

/// Rename an information system
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/v1/information-systems",
    tag = "information_systems",
    params(("id" = Uuid, Path, description = "Information system ID")),
    request_body = InformationSystemRequest,
    responses(
        (status = 200, description = "Information system renamed", body = InformationSystem),
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_information_system(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InformationSystemRequest>,
) -> Result<Json<InformationSystem>> {
    let system = state
        .catalog
        .rename_information_system(&caller, id, &payload.name)
        .await?;
    Ok(Json(system))
}

/// Delete an information system without accesses
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/information-systems",
    tag = "information_systems",
    params(("id" = Uuid, Path, description = "Information system ID")),
    responses(
        (status = 204, description = "Information system deleted"),
        (status = 409, description = "Still has accesses", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_information_system(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.catalog.delete_information_system(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Access tree of one information system, depth first
#[utoipa::path(
    get,
    path = "/{id}/accesses",
    context_path = "/api/v1/information-systems",
    tag = "information_systems",
    params(("id" = Uuid, Path, description = "Information system ID")),
    responses(
        (status = 200, description = "Accesses with paths", body = Vec<AccessView>),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_system_accesses(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AccessView>>> {
    // 404 for unknown systems instead of an empty tree
    state.catalog.get_information_system(&caller, id).await?;
    let accesses = state
        .catalog
        .list_accesses(&caller, Some(id), &ListFilter::default())
        .await?;
    Ok(Json(accesses))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_information_systems,
        get_information_system,
        create_information_system,
        rename_information_system,
        delete_information_system,
        list_system_accesses,
    ),
    components(schemas(InformationSystemRequest, InformationSystem))
)]
pub struct InformationSystemsApiDoc;
