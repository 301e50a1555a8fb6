//! End-to-end API tests over the in-memory store.
//!
//! Each test builds its own application, so they run in parallel without
//! shared state.

mod common;

use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{id_of, TestApp};

/// Department "IT" with unit "Helpdesk" and a Restricted user "ivan" who
/// holds a unit grant on Helpdesk. Returns `(unit_id, ivan_id)`.
async fn seed_helpdesk(app: &TestApp, admin: &str) -> (String, String) {
    let (status, dept) = app
        .post("/api/v1/departments", admin, json!({ "description": "IT" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, unit) = app
        .post(
            "/api/v1/units",
            admin,
            json!({ "department_id": id_of(&dept), "description": "Helpdesk" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let unit_id = id_of(&unit);

    let (status, ivan) = app
        .post(
            "/api/v1/users",
            admin,
            json!({
                "username": "ivan",
                "password": "ivan-password-1",
                "first_name": "Ivan",
                "last_name": "Petrov",
                "unit_id": unit_id,
                "reading_access": "restricted",
                "writing_access": "restricted",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", ivan);
    let ivan_id = id_of(&ivan);

    let (status, _) = app
        .post(
            &format!("/api/v1/users/{}/units/{}", ivan_id, unit_id),
            admin,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    (unit_id, ivan_id)
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_restricted_user_sees_only_granted_units() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, ivan_id) = seed_helpdesk(&app, &admin).await;

    let ivan = app.login("ivan", "ivan-password-1").await;

    let (status, users) = app.get("/api/v1/users", &ivan).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["total"], 1);
    assert_eq!(users["items"][0]["id"], ivan_id.as_str());
    assert!(users["items"][0].get("password_hash").is_none());

    // The admin lives outside ivan's units
    let (_, me) = app.get("/api/v1/auth/me", &admin).await;
    let admin_id = me["user"]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .get(&format!("/api/v1/users/{}", admin_id), &ivan)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, depts) = app.get("/api/v1/departments", &ivan).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(depts["total"], 1);
    assert_eq!(depts["items"][0]["description"], "IT");

    // Restricted writers cannot create departments or read the log
    let (status, _) = app
        .post("/api/v1/departments", &ivan, json!({ "description": "HR" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/logs", &ivan).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_grant_and_revoke_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, ivan_id) = seed_helpdesk(&app, &admin).await;

    let (status, system) = app
        .post(
            "/api/v1/information-systems",
            &admin,
            json!({ "name": "ERP" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let system_id = id_of(&system);

    let (_, root) = app
        .post(
            "/api/v1/accesses",
            &admin,
            json!({ "information_system_id": system_id, "description": "ERP Admin" }),
        )
        .await;
    let (status, reports) = app
        .post(
            "/api/v1/accesses",
            &admin,
            json!({
                "information_system_id": system_id,
                "parent_access_id": id_of(&root),
                "description": "Reports",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reports["path"], "ERP Admin -> Reports");
    let access_id = id_of(&reports);

    let (_, order1) = app
        .post("/api/v1/directives", &admin, json!({ "name": "Order 1" }))
        .await;
    let (_, order2) = app
        .post("/api/v1/directives", &admin, json!({ "name": "Order 2" }))
        .await;

    let grant_uri = format!("/api/v1/users/{}/accesses/{}", ivan_id, access_id);
    let (_, state) = app.get(&grant_uri, &admin).await;
    assert_eq!(state["state"], "never_granted");

    let (status, row) = app
        .post(&grant_uri, &admin, json!({ "directive_id": id_of(&order1) }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(row["revoked_on"].is_null());

    let (_, state) = app.get(&grant_uri, &admin).await;
    assert_eq!(state["state"], "active_grant");
    assert_eq!(state["directive_id"], id_of(&order1).as_str());

    let revoke_uri = format!("{}/revoke", grant_uri);
    let (status, row) = app
        .post(&revoke_uri, &admin, json!({ "directive_id": id_of(&order2) }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["revoked_by_directive_id"], id_of(&order2).as_str());

    let (status, body) = app
        .post(&revoke_uri, &admin, json!({ "directive_id": id_of(&order2) }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_REVOKED");

    let (_, grants) = app
        .get(&format!("/api/v1/users/{}/accesses", ivan_id), &admin)
        .await;
    assert_eq!(grants.as_array().unwrap().len(), 1);
    assert_eq!(grants[0]["active"], false);
    assert_eq!(grants[0]["access_path"], "ERP Admin -> Reports");

    // A granted access cannot be removed from the catalog
    let (status, _) = app
        .delete(&format!("/api/v1/accesses/{}", access_id), &admin)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, logs) = app.get("/api/v1/logs?per_page=5", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["per_page"], 5);
    assert!(logs["total"].as_i64().unwrap() > 5);
    assert_eq!(logs["items"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_access_move_rejects_cycle() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (_, system) = app
        .post(
            "/api/v1/information-systems",
            &admin,
            json!({ "name": "Mail" }),
        )
        .await;
    let (_, root) = app
        .post(
            "/api/v1/accesses",
            &admin,
            json!({ "information_system_id": id_of(&system), "description": "Mailboxes" }),
        )
        .await;
    let (_, child) = app
        .post(
            "/api/v1/accesses",
            &admin,
            json!({
                "information_system_id": id_of(&system),
                "parent_access_id": id_of(&root),
                "description": "Shared",
            }),
        )
        .await;

    let (status, body) = app
        .post(
            &format!("/api/v1/accesses/{}/move", id_of(&root)),
            &admin,
            json!({ "parent_access_id": id_of(&child) }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "CYCLE_DETECTED");

    let (status, moved) = app
        .post(
            &format!("/api/v1/accesses/{}/move", id_of(&child)),
            &admin,
            json!({ "parent_access_id": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["path"], "Shared");
    assert_eq!(moved["depth"], 0);
}

#[tokio::test]
async fn test_department_cascade_and_restore() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (unit_id, ivan_id) = seed_helpdesk(&app, &admin).await;

    let (_, unit) = app.get(&format!("/api/v1/units/{}", unit_id), &admin).await;
    let dept_id = unit["department_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .delete(&format!("/api/v1/departments/{}", dept_id), &admin)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Full readers still open a deleted user, stamped with the cascade
    let (status, ivan) = app.get(&format!("/api/v1/users/{}", ivan_id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ivan["deleted_on"].is_string());
    let (_, live) = app.get("/api/v1/users", &admin).await;
    assert_eq!(live["total"], 1);
    let (_, deleted) = app.get("/api/v1/users?include_deleted=true", &admin).await;
    assert_eq!(deleted["total"], 2);

    let (status, restored) = app
        .post(
            &format!("/api/v1/departments/{}/restore", dept_id),
            &admin,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(restored["deleted_on"].is_null());
    let (status, ivan) = app.get(&format!("/api/v1/users/{}", ivan_id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ivan["deleted_on"].is_null());

    // The admin's own department would take the caller with it
    let (_, me) = app.get("/api/v1/auth/me", &admin).await;
    let (_, admin_unit) = app
        .get(
            &format!("/api/v1/units/{}", me["user"]["unit_id"].as_str().unwrap()),
            &admin,
        )
        .await;
    let (status, body) = app
        .delete(
            &format!(
                "/api/v1/departments/{}",
                admin_unit["department_id"].as_str().unwrap()
            ),
            &admin,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "BLOCKED");
}

#[tokio::test]
async fn test_export_users_csv() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    seed_helpdesk(&app, &admin).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/export/users.csv?lang=en")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"users-en.csv\""
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body[3..].to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Username,"));
    assert!(text.contains("ivan"));

    let (status, _) = app
        .get("/api/v1/export/users.csv?lang=fr", &admin)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_import_users_and_reset() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let csv = "\
username,first_name,last_name,department,unit,position
maria,Maria,Ivanova,Finance,Payroll,Accountant
georgi,Georgi,Dimitrov,Finance,Payroll,
";
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/admin/import/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .header(header::CONTENT_TYPE, "text/csv")
                .body(axum::body::Body::from(csv))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["created"], 2);
    assert!(report["errors"].as_array().unwrap().is_empty());

    let (_, users) = app.get("/api/v1/users", &admin).await;
    assert_eq!(users["total"], 3);
    let (_, users) = app.get("/api/v1/users?search=maria", &admin).await;
    assert_eq!(users["total"], 1);

    let (status, _) = app.post("/api/v1/admin/reset", &admin, json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, users) = app.get("/api/v1/users", &admin).await;
    assert_eq!(users["total"], 1);
    assert_eq!(users["items"][0]["username"], "admin");
}
