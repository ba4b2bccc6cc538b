//! Database integration tests
//!
//! These tests require a running database reachable through the usual
//! `DB_*` environment variables (PostgreSQL on localhost by default).
//! Run them with `cargo test -- --ignored`.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use backoffice_server::database::{AccessMode, DatabaseHandle, DatabaseManager, PRIMARY, UserStore};
use backoffice_server::services::UserService;
use backoffice_server::{AppConfig, Application};
use serde_json::{Value, json};
use serial_test::serial;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

async fn start(use_orm: bool) -> Application {
    let mut config = AppConfig::from_sources(None, |name| std::env::var(name).ok())
        .expect("test configuration should load");
    config.database.use_orm = use_orm;
    config.database.run_migrations = true;
    config.databases.clear();

    Application::new(config)
        .await
        .expect("test database should be reachable")
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn unique_email(tag: &str) -> String {
    format!("{}-{}@example.com", tag, Uuid::new_v4().simple())
}

async fn remove_user(db: &DatabaseManager, id: &str) {
    let driver = db.get_driver(PRIMARY).unwrap();
    let store = UserStore::for_driver(driver.as_ref()).unwrap();
    let _ = store.delete(Uuid::parse_str(id).unwrap()).await;
}

async fn auth_flow(use_orm: bool) {
    let app = start(use_orm).await;
    let router = app.router();
    let email = unique_email(if use_orm { "orm" } else { "sql" });

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/auth/register",
        Some(json!({
            "email": email,
            "password": "secret1",
            "username": "alice",
            "first_name": "Alice",
            "last_name": "Smith",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["user"].get("password").is_none());
    assert_eq!(body["user"]["role"], "user");
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let users = UserService::new(Arc::clone(app.database()));
    let found = users.get_user_by_email(&email).await.unwrap();
    assert_eq!(found.id.to_string(), user_id);
    assert!(found.password.is_empty());
    assert!(users.get_user_by_email(&unique_email("nobody")).await.is_err());

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/auth/register",
        Some(json!({
            "email": email,
            "password": "secret1",
            "username": "alice",
            "first_name": "Alice",
            "last_name": "Smith",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/auth/login",
        Some(json!({ "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["id"], user_id.as_str());

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/auth/login",
        Some(json!({ "email": email, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&router, Method::GET, &format!("/api/v1/users/{}", user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], email.as_str());

    let (status, body) = call(
        &router,
        Method::PUT,
        &format!("/api/v1/users/{}", user_id),
        Some(json!({ "first_name": "Alicia", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["first_name"], "Alicia");
    assert_eq!(body["data"]["last_name"], "Smith");

    // an empty password in the update keeps the stored hash
    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/auth/login",
        Some(json!({ "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let unknown = Uuid::new_v4();
    let (status, _) = call(&router, Method::GET, &format!("/api/v1/users/{}", unknown), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&router, Method::DELETE, &format!("/api/v1/users/{}", user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&router, Method::DELETE, &format!("/api/v1/users/{}", user_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.database().close_all().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running database"]
async fn test_auth_flow_orm() {
    auth_flow(true).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running database"]
async fn test_auth_flow_raw_sql() {
    auth_flow(false).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running database"]
async fn test_created_user_without_password_cannot_log_in() {
    let app = start(true).await;
    let router = app.router();
    let email = unique_email("nopass");

    let (status, body) = call(
        &router,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "email": email, "role": "guest" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["role"], "guest");
    let user_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &router,
        Method::POST,
        "/api/v1/auth/login",
        Some(json!({ "email": email, "password": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    remove_user(app.database(), &user_id).await;
    app.database().close_all().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running database"]
async fn test_list_is_idempotent() {
    for use_orm in [true, false] {
        let app = start(use_orm).await;
        let router = app.router();

        let mut created = Vec::new();
        for i in 0..3 {
            let (status, body) = call(
                &router,
                Method::POST,
                "/api/v1/users",
                Some(json!({ "email": unique_email(&format!("list{}", i)) })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            created.push(body["data"]["id"].as_str().unwrap().to_string());
        }

        let (status, first) = call(&router, Method::GET, "/api/v1/users?page=1&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, second) = call(&router, Method::GET, "/api/v1/users?page=1&limit=5", None).await;

        assert_eq!(first["data"], second["data"]);
        assert_eq!(first["pagination"]["limit"], 5);
        assert!(first["data"].as_array().unwrap().len() <= 5);

        // newest first
        let newest = first["data"][0]["id"].as_str().unwrap();
        assert_eq!(newest, created[2]);

        for id in &created {
            remove_user(app.database(), id).await;
        }
        app.database().close_all().await.unwrap();
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires a running database"]
async fn test_connected_driver_exposes_handles_for_its_mode() {
    for use_orm in [true, false] {
        let app = start(use_orm).await;
        let driver = app.database().get_driver(PRIMARY).unwrap();

        assert!(driver.is_connected());
        assert!(driver.sql_pool().is_some());
        assert_eq!(driver.orm().is_some(), use_orm);
        match driver.handle().unwrap() {
            DatabaseHandle::Orm(_) => assert!(use_orm),
            DatabaseHandle::Sql(_) => assert!(!use_orm),
        }
        assert_eq!(
            driver.access_mode(),
            if use_orm { AccessMode::Orm } else { AccessMode::RawSql }
        );
        driver.ping().await.unwrap();

        app.database().close_all().await.unwrap();
        assert!(!driver.is_connected());
        assert!(driver.sql_pool().is_none());
        assert!(driver.orm().is_none());
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires a running database"]
async fn test_far_page_is_empty_in_both_modes() {
    for use_orm in [true, false] {
        let app = start(use_orm).await;
        let router = app.router();

        for uri in [
            "/api/v1/users?page=100000000000000000&limit=100",
            "/api/v1/users?page=99999999999999999999&limit=99999999999999999999",
        ] {
            let (status, body) = call(&router, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK, "orm={} {}", use_orm, body);
            assert_eq!(body["data"], json!([]));
            assert_eq!(body["pagination"]["limit"], 100);
            assert_eq!(body["pagination"]["total"], 0);
        }

        app.database().close_all().await.unwrap();
    }
}
