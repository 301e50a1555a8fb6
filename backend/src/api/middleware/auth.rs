//! Authentication middleware.
//!
//! Resolves the session token to a [`CallerContext`] and stores it in the
//! request extensions. Supported token sources:
//! - `Authorization: Bearer <jwt_token>`
//! - the `session` cookie set by the login endpoint

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::AppError;
use crate::services::auth_service::AuthService;

/// Name of the HttpOnly session cookie
pub const SESSION_COOKIE: &str = "session";

/// HttpOnly session cookie carrying the access token
pub fn session_cookie(token: String, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(cookie::time::Duration::seconds(max_age))
        .build()
}

/// Expired session cookie that clears the browser's copy
pub fn logout_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .build();
    cookie.make_removal();
    cookie
}

/// Token extraction result
#[derive(Debug, PartialEq, Eq)]
enum ExtractedToken {
    Bearer(String),
    Cookie(String),
    None,
    /// Authorization header present but not a Bearer token
    Invalid,
}

/// Extract token from request headers; the Authorization header wins
fn extract_token(request: &Request) -> ExtractedToken {
    if let Some(auth_header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        return match auth_header.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => {
                ExtractedToken::Bearer(token.trim().to_string())
            }
            _ => ExtractedToken::Invalid,
        };
    }

    CookieJar::from_headers(request.headers())
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value_trimmed())
        .filter(|value| !value.is_empty())
        .map(|value| ExtractedToken::Cookie(value.to_string()))
        .unwrap_or(ExtractedToken::None)
}

/// Authentication middleware function - requires a valid session
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_token(&request) {
        ExtractedToken::Bearer(token) | ExtractedToken::Cookie(token) => token,
        ExtractedToken::None => {
            return AppError::Authentication("Missing session token".to_string()).into_response()
        }
        ExtractedToken::Invalid => {
            return AppError::Authentication("Invalid authorization header format".to_string())
                .into_response()
        }
    };

    match auth_service.resolve_caller(&token).await {
        Ok(caller) => {
            tracing::debug!(user = %caller.username, "Authenticated request");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
