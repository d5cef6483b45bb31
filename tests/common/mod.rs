#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use murmur::infra::db::Db;
use murmur::AppState;

// Test-only symmetric key (32 bytes)
const TEST_PASETO_ACCESS_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
pub const DEFAULT_PASSWORD: &str = "testpassword123";
pub const POSTS_PER_PAGE: u32 = 3;

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub access_token: String,
}

/// Create a fresh TestApp with its own in-memory database.
pub async fn app() -> TestApp {
    TestApp::setup().await
}

impl TestApp {
    async fn setup() -> Self {
        // A single pinned connection keeps the in-memory database alive for
        // the lifetime of the app.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("cannot open in-memory database");

        let db = Db::from_pool(pool);
        db.migrate().await.expect("migrations failed");

        let state = AppState {
            db,
            posts_per_page: POSTS_PER_PAGE,
            paseto_access_key: TEST_PASETO_ACCESS_KEY,
            access_ttl_minutes: 15,
        };

        let router = murmur::http::router(state.clone());

        TestApp { router, state }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::PATCH, path, Some(body), &headers)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::DELETE, path, None, &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Register a user through the API and log in to obtain a token.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let username = format!("testuser_{}", suffix);
        let email = format!("test_{}@example.com", suffix);

        let resp = self
            .post_json(
                "/auth/register",
                json!({
                    "username": username,
                    "email": email,
                    "password": DEFAULT_PASSWORD,
                }),
                None,
            )
            .await;
        assert_eq!(
            resp.status,
            StatusCode::OK,
            "register failed: {}",
            resp.error_message()
        );
        let id = resp.json()["id"].as_i64().expect("user id missing");

        let resp = self
            .post_json(
                "/auth/login",
                json!({ "identifier": username, "password": DEFAULT_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "login failed");
        let access_token = resp.json()["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string();

        TestUser {
            id,
            username,
            access_token,
        }
    }

    /// Make `actor` follow `target` through the API.
    pub async fn follow(&self, actor: &TestUser, target: &TestUser) {
        let resp = self
            .post_json(
                &format!("/users/{}/follow", target.username),
                json!({}),
                Some(&actor.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "follow failed");
    }

    /// Insert a post directly with a fixed timestamp (unix seconds), for
    /// deterministic ordering assertions. Returns the post id.
    pub async fn insert_post(&self, author_id: i64, body: &str, created_at: i64) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO posts (author_id, body, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(author_id)
        .bind(body)
        .bind(created_at)
        .fetch_one(self.pool())
        .await
        .expect("insert test post failed")
    }

    /// Return the pool for direct DB assertions.
    pub fn pool(&self) -> &SqlitePool {
        self.state.db.pool()
    }
}
