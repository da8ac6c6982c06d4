use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use lintara::clients::{ReviewError, Reviewer};
use lintara::config::Config;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

/// Reviewer stub that counts calls and answers with a fixed reply.
struct StubReviewer {
    calls: AtomicUsize,
    fail_with: Option<&'static str>,
}

impl StubReviewer {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_with: None,
        })
    }

    fn failing(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_with: Some(message),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reviewer for StubReviewer {
    async fn review(&self, _code: &str, _language: &str) -> Result<String, ReviewError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_with {
            Some(message) => Err(ReviewError::Request(message.to_string())),
            None if n == 1 => Ok("OK analysis".to_string()),
            None => Ok(format!("OK analysis #{n}")),
        }
    }
}

async fn spawn_app(reviewer: Arc<StubReviewer>) -> Router {
    let db_path = std::env::temp_dir().join(format!("lintara-api-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = lintara::api::create_app_state_with_reviewer(config, reviewer, None)
        .await
        .expect("Failed to create app state");
    lintara::api::router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, json)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register(app: &Router, username: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/users",
            None,
            &json!({
                "email": format!("{username}@example.com"),
                "username": username,
                "password": "secret123"
            }),
        ),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={username}&password={password}")))
            .unwrap(),
    )
    .await
}

/// Registers `username` and returns a fresh access token.
async fn sign_up(app: &Router, username: &str) -> String {
    let (status, _) = register(app, username).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = login(app, username, "secret123").await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["access_token"].as_str().unwrap().to_string()
}

async fn submit(app: &Router, token: &str, code: &str) -> Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/analysis",
            Some(token),
            &json!({"title": "snippet", "code_content": code, "language": "python"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"].clone()
}

/// Polls the record until the pipeline has resolved it.
async fn wait_for_resolution(app: &Router, token: &str, id: i64) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, get(&format!("/analysis/{id}"), token)).await;
        assert_eq!(status, StatusCode::OK);

        let record = body["data"].clone();
        if record["status"] == "completed" || record["status"] == "failed" {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("analysis {id} never resolved");
}

#[tokio::test]
async fn test_root_and_health() {
    let app = spawn_app(StubReviewer::ok()).await;

    let (status, body) = send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Welcome to Lintara API");

    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["service"], "lintara-api");
    assert_eq!(body["data"]["database"], "ok");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = spawn_app(StubReviewer::ok()).await;

    let (status, body) = register(&app, "alice").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("hashed_password").is_none());

    let (status, login_body) = login(&app, "alice", "secret123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login_body["data"]["token_type"], "bearer");
    assert_eq!(login_body["data"]["username"], "alice");
    assert_eq!(login_body["data"]["user_id"], body["data"]["id"]);

    let token = login_body["data"]["access_token"].as_str().unwrap();
    let (status, me) = send(&app, get("/auth/me", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["username"], "alice");

    let (status, user) = send(
        &app,
        get(&format!("/users/{}", body["data"]["id"]), token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["data"]["username"], "alice");

    let (status, _) = send(&app, get("/users/9999", token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let app = spawn_app(StubReviewer::ok()).await;
    register(&app, "alice").await;

    let (status, body) = register(&app, "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Email already registered");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/users",
            None,
            &json!({"email": "other@example.com", "username": "alice", "password": "secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username already taken");
}

#[tokio::test]
async fn test_registration_validation() {
    let app = spawn_app(StubReviewer::ok()).await;

    for payload in [
        json!({"email": "not-an-email", "username": "alice", "password": "secret123"}),
        json!({"email": "a@example.com", "username": "al", "password": "secret123"}),
        json!({"email": "a@example.com", "username": "alice", "password": "123"}),
    ] {
        let (status, _) = send(&app, json_request("POST", "/users", None, &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload: {payload}");
    }
}

#[tokio::test]
async fn test_bad_credentials_are_unauthorized() {
    let app = spawn_app(StubReviewer::ok()).await;
    register(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=alice&password=wrong-password"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let (status, _) = login(&app, "nobody", "secret123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let app = spawn_app(StubReviewer::ok()).await;

    let (status, _) = send(
        &app,
        Request::builder().uri("/analysis").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/analysis", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = spawn_app(StubReviewer::ok()).await;
    let token = sign_up(&app, "alice").await;

    let (status, body) = send(&app, authed("POST", "/auth/logout", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["message"].is_string());

    let (status, _) = send(&app, get("/auth/me", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = login(&app, "alice", "secret123").await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["data"]["access_token"].as_str().unwrap();
    let (status, _) = send(&app, get("/auth/me", fresh)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_analysis_completes_end_to_end() {
    let reviewer = StubReviewer::ok();
    let app = spawn_app(reviewer.clone()).await;
    let token = sign_up(&app, "alice").await;

    let created = submit(&app, &token, "print(1)").await;
    assert_eq!(created["status"], "pending");
    assert!(created["result"].is_null());
    assert!(created["completed_at"].is_null());
    assert_eq!(created["language"], "python");

    let id = created["id"].as_i64().unwrap();
    let resolved = wait_for_resolution(&app, &token, id).await;

    assert_eq!(resolved["status"], "completed");
    assert_eq!(resolved["result"], "OK analysis");
    assert!(resolved["completed_at"].is_string());
    assert_eq!(reviewer.calls(), 1);
}

#[tokio::test]
async fn test_reviewer_failure_is_recorded_on_the_analysis() {
    let app = spawn_app(StubReviewer::failing("connection refused")).await;
    let token = sign_up(&app, "alice").await;

    let created = submit(&app, &token, "print(1)").await;
    let resolved = wait_for_resolution(&app, &token, created["id"].as_i64().unwrap()).await;

    assert_eq!(resolved["status"], "failed");
    let result = resolved["result"].as_str().unwrap();
    assert!(result.starts_with("Analysis failed: "), "result: {result}");
    assert!(result.contains("connection refused"));
    assert!(resolved["completed_at"].is_string());
}

#[tokio::test]
async fn test_ownership_isolation() {
    let app = spawn_app(StubReviewer::ok()).await;
    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;

    let created = submit(&app, &alice, "print(1)").await;
    let uri = format!("/analysis/{}", created["id"]);

    let (status, _) = send(&app, get(&uri, &bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &uri,
            Some(&bob),
            &json!({"title": "mine", "code_content": "x", "language": "python"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, authed("DELETE", &uri, &bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, authed("POST", &format!("{uri}/reanalyze"), &bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listing) = send(&app, get("/analysis", &bob)).await;
    assert_eq!(listing["data"].as_array().unwrap().len(), 0);

    let (status, _) = send(&app, get(&uri, &alice)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_resets_and_reruns() {
    let reviewer = StubReviewer::ok();
    let app = spawn_app(reviewer.clone()).await;
    let token = sign_up(&app, "alice").await;

    let created = submit(&app, &token, "print(1)").await;
    let id = created["id"].as_i64().unwrap();
    wait_for_resolution(&app, &token, id).await;

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/analysis/{id}"),
            Some(&token),
            &json!({"title": "v2", "code_content": "print(2)", "language": "python"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"]["result"].is_null());
    assert!(body["data"]["completed_at"].is_null());
    assert_eq!(body["data"]["code_content"], "print(2)");

    let resolved = wait_for_resolution(&app, &token, id).await;
    assert_eq!(resolved["status"], "completed");
    assert_eq!(resolved["result"], "OK analysis #2");
    assert_eq!(resolved["title"], "v2");
    assert_eq!(reviewer.calls(), 2);
}

#[tokio::test]
async fn test_reanalyze_keeps_code_and_reruns() {
    let reviewer = StubReviewer::ok();
    let app = spawn_app(reviewer.clone()).await;
    let token = sign_up(&app, "alice").await;

    let created = submit(&app, &token, "print(1)").await;
    let id = created["id"].as_i64().unwrap();
    wait_for_resolution(&app, &token, id).await;

    let (status, body) = send(
        &app,
        authed("POST", &format!("/analysis/{id}/reanalyze"), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["code_content"], "print(1)");

    let resolved = wait_for_resolution(&app, &token, id).await;
    assert_eq!(resolved["result"], "OK analysis #2");
    assert_eq!(reviewer.calls(), 2);
}

#[tokio::test]
async fn test_delete_analysis() {
    let app = spawn_app(StubReviewer::ok()).await;
    let token = sign_up(&app, "alice").await;

    let created = submit(&app, &token, "print(1)").await;
    let uri = format!("/analysis/{}", created["id"]);

    let (status, body) = send(&app, authed("DELETE", &uri, &token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(&app, get(&uri, &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, authed("DELETE", &uri, &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_paginates_in_submission_order() {
    let app = spawn_app(StubReviewer::ok()).await;
    let token = sign_up(&app, "alice").await;

    let first = submit(&app, &token, "a = 1").await;
    let second = submit(&app, &token, "b = 2").await;
    submit(&app, &token, "c = 3").await;

    let (status, body) = send(&app, get("/analysis", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let all = body["data"].as_array().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0]["id"], first["id"]);

    let (_, body) = send(&app, get("/analysis?skip=1&limit=1", &token)).await;
    let page = body["data"].as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["id"], second["id"]);
}

#[tokio::test]
async fn test_analysis_validation() {
    let app = spawn_app(StubReviewer::ok()).await;
    let token = sign_up(&app, "alice").await;

    for payload in [
        json!({"title": "", "code_content": "x", "language": "python"}),
        json!({"title": "t", "code_content": "", "language": "python"}),
        json!({"title": "t", "code_content": "x", "language": ""}),
        json!({"title": "t".repeat(201), "code_content": "x", "language": "python"}),
    ] {
        let (status, _) = send(&app, json_request("POST", "/analysis", Some(&token), &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload: {payload}");
    }

    for uri in [
        "/analysis?limit=0",
        "/analysis?limit=101",
        "/analysis/0",
        "/analysis?skip=18446744073709551615",
        "/analysis?skip=9223372036854775808",
        "/users?skip=18446744073709551615",
    ] {
        let (status, _) = send(&app, get(uri, &token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {uri}");
    }
}

#[tokio::test]
async fn test_collection_routes_accept_trailing_slash() {
    let app = spawn_app(StubReviewer::ok()).await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/users/",
            None,
            &json!({"email": "carol@example.com", "username": "carol", "password": "secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = login(&app, "carol", "secret123").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/analysis/",
            Some(&token),
            &json!({"title": "snippet", "code_content": "print(1)", "language": "python"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();
    wait_for_resolution(&app, &token, id).await;

    let (status, body) = send(&app, get("/analysis/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, get("/users/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, get("/analysis/", "not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
