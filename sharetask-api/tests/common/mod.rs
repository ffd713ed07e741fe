//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Test database setup (skipped when `DATABASE_URL` is unset)
//! - Test user creation with bearer tokens
//! - A request helper that drives the full service stack

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sharetask_api::{
    app::{build_service, AppState},
    config::Config,
};
use sharetask_shared::{
    auth::{jwt::issue_token_pair, password::hash_password},
    db::pool::{create_lazy_pool, DatabaseConfig},
    models::user::{CreateUser, User},
};
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "Str0ng!Passw0rd";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: NormalizePath<Router>,
    pub config: Config,
}

/// A user created for a test, with a valid access token
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

pub fn test_config(database_url: &str) -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.to_string()),
        "JWT_SECRET" => Some(TEST_SECRET.to_string()),
        _ => None,
    })
    .expect("test configuration is valid")
}

impl TestContext {
    /// Connects to `DATABASE_URL` and runs migrations
    ///
    /// Returns `None` when no database is configured so the calling test can
    /// skip itself.
    pub async fn new() -> Option<Self> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set, skipping database test");
                return None;
            }
        };

        let config = test_config(&url);

        let db = PgPool::connect(&config.database.url)
            .await
            .expect("failed to connect to test database");

        // Path relative to Cargo.toml, not this file
        sqlx::migrate!("../migrations")
            .run(&db)
            .await
            .expect("failed to run migrations");

        let app = build_service(AppState::new(db.clone(), config.clone()));

        Some(TestContext { db, app, config })
    }

    /// Creates a user with a unique username and issues tokens for it
    pub async fn create_user(&self, prefix: &str) -> TestUser {
        let username = unique_name(prefix);

        let user = User::create(
            &self.db,
            CreateUser {
                username: username.clone(),
                email: format!("{}@example.com", username),
                password_hash: hash_password(TEST_PASSWORD).expect("hash password"),
            },
        )
        .await
        .expect("create user");

        let tokens = issue_token_pair(user.id, &self.config.jwt.secret, &self.config.jwt.lifetimes())
            .expect("issue tokens");

        TestUser {
            id: user.id,
            username,
            token: tokens.access,
        }
    }

    /// Sends a request through the whole stack and returns status and JSON body
    ///
    /// An empty body decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(self.app.clone(), method, uri, token, body).await
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(&user.token), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(&user.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(&user.token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(&user.token), None).await
    }

    /// Creates a task as `user` and returns its id
    pub async fn create_task(&self, user: &TestUser, body: Value) -> Uuid {
        let (status, task) = self.post("/api/tasks", user, body).await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {}", task);
        id_of(&task)
    }

    /// Removes users created by a test; their tasks, shares and categories cascade
    pub async fn cleanup(&self, users: &[&TestUser]) {
        for user in users {
            User::delete(&self.db, user.id).await.expect("delete user");
        }
    }
}

/// Builds the service over a pool that never connects
///
/// Good for anything answered before the first query: public routes that
/// fail validation, and requests rejected by the bearer check.
pub fn offline_app() -> NormalizePath<Router> {
    let url = "postgresql://nobody@127.0.0.1:1/sharetask_offline";

    let pool = create_lazy_pool(DatabaseConfig {
        url: url.to_string(),
        min_connections: 0,
        connect_timeout_seconds: 1,
        ..Default::default()
    })
    .expect("lazy pool");

    build_service(AppState::new(pool, test_config(url)))
}

pub async fn send(
    app: NormalizePath<Router>,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.oneshot(request).await.expect("infallible service");
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is JSON")
    };

    (status, json)
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("response has an id")
}

/// Titles of a paginated task list, in order
pub fn titles(page: &Value) -> Vec<String> {
    page["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|task| task["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Field names of a validation error body
pub fn error_fields(body: &Value) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .filter_map(|d| d["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
