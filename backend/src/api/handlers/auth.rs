//! Authentication handlers.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::{logout_cookie, session_cookie};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::user::{AuthorityLevel, User};
use crate::services::auth_service::SessionToken;
use crate::services::visibility::CallerContext;

/// Create public auth routes (no auth required)
pub fn public_router() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Create protected auth routes (auth required)
pub fn protected_router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/password", post(change_password))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The signed-in user and the authority it acts with
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUserResponse {
    pub user: User,
    pub reading_access: AuthorityLevel,
    pub writing_access: AuthorityLevel,
    /// Units granted to the caller
    pub unit_ids: Vec<uuid::Uuid>,
}

/// Login with credentials
#[utoipa::path(
    post,
    path = "/login",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; also sets the session cookie", body = SessionToken),
        (status = 401, description = "Invalid credentials", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let (_, token) = state
        .auth
        .authenticate(&payload.username, &payload.password)
        .await?;

    let jar = jar.add(session_cookie(
        token.access_token.clone(),
        token.expires_in,
        state.config.secure_cookies,
    ));
    Ok((jar, Json(token)))
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/logout",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 204, description = "Session cookie cleared"),
    )
)]
pub async fn logout(State(state): State<SharedState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(logout_cookie(state.config.secure_cookies));
    (StatusCode::NO_CONTENT, jar)
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/me",
    context_path = "/api/v1/auth",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Not signed in", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<CurrentUserResponse>> {
    let user = state
        .store
        .get_user(caller.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(CurrentUserResponse {
        user,
        reading_access: caller.reading,
        writing_access: caller.writing,
        unit_ids: caller.unit_ids.into_iter().collect(),
    }))
}

/// Change the caller's own password
#[utoipa::path(
    post,
    path = "/password",
    context_path = "/api/v1/auth",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password too short", body = crate::api::openapi::ErrorResponse),
        (status = 401, description = "Current password wrong", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerContext>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    state
        .auth
        .change_password(&caller, &payload.current_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(login, logout, get_current_user, change_password),
    components(schemas(
        LoginRequest,
        ChangePasswordRequest,
        CurrentUserResponse,
        SessionToken,
    ))
)]
pub struct AuthApiDoc;
