//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Top-level OpenAPI document for the Access Console API.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs that are merged into this root document at
/// startup.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Access Console API",
        description = "Organizational directory, access hierarchies and directive-backed access grants.",
        version = "0.1.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Sign-in, session cookie and password change"),
        (name = "departments", description = "Department directory"),
        (name = "units", description = "Units within departments"),
        (name = "users", description = "Users, placement and unit grants"),
        (name = "information_systems", description = "Information systems owning access trees"),
        (name = "accesses", description = "Access hierarchy"),
        (name = "grants", description = "Directive-backed access grants and revocations"),
        (name = "directives", description = "Directive ledger"),
        (name = "logs", description = "Audit log"),
        (name = "export", description = "CSV exports"),
        (name = "admin", description = "Bulk import and data reset"),
        (name = "health", description = "Health and readiness checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Adds Bearer JWT security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.merge(super::handlers::health::HealthApiDoc::openapi());
    doc.merge(super::handlers::auth::AuthApiDoc::openapi());
    doc.merge(super::handlers::departments::DepartmentsApiDoc::openapi());
    doc.merge(super::handlers::units::UnitsApiDoc::openapi());
    doc.merge(super::handlers::users::UsersApiDoc::openapi());
    doc.merge(super::handlers::information_systems::InformationSystemsApiDoc::openapi());
    doc.merge(super::handlers::accesses::AccessesApiDoc::openapi());
    doc.merge(super::handlers::directives::DirectivesApiDoc::openapi());
    doc.merge(super::handlers::logs::LogsApiDoc::openapi());
    doc.merge(super::handlers::export::ExportApiDoc::openapi());
    doc.merge(super::handlers::admin::AdminApiDoc::openapi());

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_is_valid() {
        let spec = build_openapi();

        // Catches missing module merges
        let path_count = spec.paths.paths.len();
        assert!(
            path_count >= 40,
            "Expected at least 40 paths, got {path_count}. A module merge may be missing."
        );

        let has_bearer = spec
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"));
        assert!(has_bearer, "Bearer auth security scheme is missing.");

        let tags: Vec<&str> = spec
            .tags
            .as_ref()
            .map_or(vec![], |t| t.iter().map(|tag| tag.name.as_str()).collect());
        for expected_tag in [
            "auth",
            "departments",
            "units",
            "users",
            "accesses",
            "grants",
            "directives",
            "logs",
            "export",
            "admin",
            "health",
        ] {
            assert!(
                tags.contains(&expected_tag),
                "Missing expected tag: {expected_tag}"
            );
        }

        serde_json::to_string(&spec).expect("Spec should serialize to JSON");
    }

    #[test]
    fn test_openapi_spec_operation_count() {
        let spec = build_openapi();
        let mut op_count = 0;

        for item in spec.paths.paths.values() {
            for op in [&item.get, &item.post, &item.put, &item.patch, &item.delete] {
                if op.is_some() {
                    op_count += 1;
                }
            }
        }

        assert!(
            op_count >= 60,
            "Expected at least 60 operations, got {op_count}. Handler annotations may be missing."
        );
    }

    #[test]
    fn test_grant_endpoints_in_spec() {
        let spec = build_openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(|k| k.as_str()).collect();

        let revoke = "/api/v1/users/{id}/accesses/{access_id}/revoke";
        assert!(paths.contains(&revoke), "Missing {revoke}");
        let item = &spec.paths.paths[revoke];
        assert!(item.post.is_some());

        let grant = &spec.paths.paths["/api/v1/users/{id}/accesses/{access_id}"];
        assert!(grant.get.is_some(), "grant state should be GET");
        assert!(grant.post.is_some(), "grant should be POST");
    }
}
