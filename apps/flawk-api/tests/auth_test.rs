mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use flawk_api::db::store::UserStore;

// ---------------------------------------------------------------------------
// POST /api/v1/auth/register
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_returns_token_and_user() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": "New@Example.com", "password": "long-enough", "phone": "+1 555 0100" }))
        .await;
    resp.assert_status(StatusCode::CREATED);

    let body: Value = resp.json();
    assert_eq!(body["user"]["email"], "new@example.com");
    assert_eq!(body["user"]["phone"], "+1 555 0100");
    assert_eq!(body["user"]["permission_level"], 100);
    assert!(body["user"].get("password_hash").is_none());

    let user_id = body["user"]["id"].as_str().unwrap();
    assert!(user_id.starts_with("usr_"));

    let record = state.store.find_user(user_id).await.unwrap().unwrap();
    assert!(record.has_active_token(body["token"].as_str().unwrap()));
}

#[tokio::test]
async fn register_rejects_invalid_fields() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": "nope", "password": "short" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::create_user(&state, "taken@example.com", 100).await;

    let resp = server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": "taken@example.com", "password": "long-enough" }))
        .await;
    resp.assert_status(StatusCode::CONFLICT);
    assert_eq!(resp.json::<Value>()["error"]["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_with_correct_password_adds_active_token() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "login@example.com", 100).await;

    let resp = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "login@example.com", "password": common::TEST_PASSWORD }))
        .await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    let token = body["token"].as_str().unwrap();
    assert_ne!(token, user.token);
    assert_eq!(body["user"]["id"], user.id);

    let record = state.store.find_user(&user.id).await.unwrap().unwrap();
    assert_eq!(record.active_tokens.len(), 2);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    common::create_user(&state, "wrong@example.com", 100).await;

    for body in [
        json!({ "email": "wrong@example.com", "password": "not-the-password" }),
        json!({ "email": "missing@example.com", "password": common::TEST_PASSWORD }),
    ] {
        let resp = server.post("/api/v1/auth/login").json(&body).await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
    }
}

// ---------------------------------------------------------------------------
// Bearer-protected routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn account_requires_bearer_token() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    server.get("/api/v1/account").await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/account")
        .authorization_bearer("garbage")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn account_returns_current_user() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "me@example.com", 100).await;

    let resp = server
        .get("/api/v1/account")
        .authorization_bearer(&user.token)
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["email"], "me@example.com");
}

#[tokio::test]
async fn rotate_token_retires_the_old_one() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "rotate@example.com", 100).await;

    let resp = server
        .post("/api/v1/auth/token")
        .authorization_bearer(&user.token)
        .await;
    resp.assert_status_ok();
    let fresh = resp.json::<Value>()["token"].as_str().unwrap().to_string();

    server
        .get("/api/v1/account")
        .authorization_bearer(&user.token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/account")
        .authorization_bearer(&fresh)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn logout_revokes_token() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "bye@example.com", 100).await;

    server
        .post("/api/v1/auth/logout")
        .authorization_bearer(&user.token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get("/api/v1/account")
        .authorization_bearer(&user.token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_all_revokes_every_token() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "all@example.com", 100).await;
    let second = common::issue_token(&state, &user.id).await;

    let resp = server
        .post("/api/v1/auth/logout-all")
        .authorization_bearer(&second)
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["revoked"], 2);

    for token in [&user.token, &second] {
        server
            .get("/api/v1/account")
            .authorization_bearer(token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn expired_token_is_refused_even_while_active() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "old@example.com", 100).await;
    let expired = common::issue_expired_token(&state, &user.id).await;

    server
        .get("/api/v1/account")
        .authorization_bearer(&expired)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_revokes_every_token() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "pw@example.com", 100).await;
    let other_tab = common::issue_token(&state, &user.id).await;

    let resp = server
        .post("/api/v1/account/password")
        .authorization_bearer(&user.token)
        .json(&json!({ "current_password": common::TEST_PASSWORD, "new_password": "brand-new-pass" }))
        .await;
    resp.assert_status_ok();
    let fresh = resp.json::<Value>()["token"].as_str().unwrap().to_string();

    for stale in [&user.token, &other_tab] {
        server
            .get("/api/v1/account")
            .authorization_bearer(stale)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let record = state.store.find_user(&user.id).await.unwrap().unwrap();
    assert_eq!(record.active_tokens, vec![fresh]);

    server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "pw@example.com", "password": "brand-new-pass" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn password_change_checks_current_password() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let user = common::create_user(&state, "pw2@example.com", 100).await;

    server
        .post("/api/v1/account/password")
        .authorization_bearer(&user.token)
        .json(&json!({ "current_password": "guess-guess", "new_password": "brand-new-pass" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let record = state.store.find_user(&user.id).await.unwrap().unwrap();
    assert!(record.has_active_token(&user.token));
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_build_and_online_count() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["build_number"], common::TEST_BUILD);
    assert_eq!(body["online"], 0);
}
