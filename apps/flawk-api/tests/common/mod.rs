#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, OnceLock};

use axum::Router;
use chrono::Utc;

use flawk_api::auth::password::hash_password;
use flawk_api::auth::tokens;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use flawk_api::config::Config;
use flawk_api::db::migrations::{run_pending, test_database_url};
use flawk_api::db::pg::PgStore;
use flawk_api::db::pool::{connect, DbPool};
use flawk_api::db::schema::users;
use flawk_api::db::store::{MemoryStore, UserStore};
use flawk_api::models::user::{permission, NewUser};
use flawk_api::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_BUILD: &str = "test-build-1";
pub const TEST_PASSWORD: &str = "hunter2hunter2";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: TEST_SECRET.to_string(),
        access_token_ttl_secs: 3600,
        build_number: TEST_BUILD.to_string(),
        socket_debug: false,
        port: 0,
    }
}

/// Build a test AppState over an in-memory store.
pub fn test_state() -> AppState {
    AppState::new(test_config(), Arc::new(MemoryStore::new()))
}

pub fn test_state_with(config: Config) -> AppState {
    AppState::new(config, Arc::new(MemoryStore::new()))
}

/// A [`PgStore`] on the `<database>_test` database, migrated once per test
/// binary. `None` when DATABASE_URL is not configured, so Postgres tests can
/// skip on machines without a database.
pub async fn pg_store() -> Option<(Arc<PgStore>, DbPool)> {
    static MIGRATED: OnceLock<()> = OnceLock::new();

    let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    let url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty())?;
    let url = test_database_url(&url);

    let migrate_url = url.clone();
    tokio::task::spawn_blocking(move || {
        MIGRATED.get_or_init(|| {
            run_pending(&migrate_url).expect("migrate test database");
        });
    })
    .await
    .expect("migration task");

    let pool = connect(&url).expect("test pool");
    Some((Arc::new(PgStore::new(pool.clone())), pool))
}

/// Delete a user created by a Postgres test. Tokens and notifications go
/// with it.
pub async fn cleanup_user(pool: &DbPool, user_id: &str) {
    let mut conn = pool.get().await.expect("db connection");
    diesel::delete(users::table.find(user_id))
        .execute(&mut conn)
        .await
        .expect("delete test user");
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = flawk_api::routes::router().with_state(state.clone());
    (app, state)
}

/// A user created directly in the store, with one active token.
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

pub async fn create_user(state: &AppState, email: &str, permission_level: i32) -> TestUser {
    let record = state
        .store
        .create_user(NewUser {
            id: flawk_common::id::prefixed_ulid(flawk_common::id::prefix::USER),
            email: email.to_string(),
            phone: None,
            password_hash: hash_password(TEST_PASSWORD).expect("hash"),
            permission_level,
            created_at: Utc::now(),
        })
        .await
        .expect("create user");

    let token = issue_token(state, &record.user.id).await;
    TestUser {
        id: record.user.id,
        email: email.to_string(),
        token,
    }
}

pub async fn create_admin(state: &AppState, email: &str) -> TestUser {
    create_user(state, email, permission::ADMIN).await
}

/// Mint a token and register it as active for `user_id`.
pub async fn issue_token(state: &AppState, user_id: &str) -> String {
    let token = tokens::mint_access_token(TEST_SECRET, user_id, 3600).expect("mint");
    state
        .store
        .add_active_token(user_id, &token)
        .await
        .expect("add token");
    token
}

/// A correctly signed token that expired a few seconds ago, already present
/// in the user's active list.
pub async fn issue_expired_token(state: &AppState, user_id: &str) -> String {
    let token = tokens::encode_token(TEST_SECRET, user_id, Utc::now().timestamp() - 10).expect("mint");
    state
        .store
        .add_active_token(user_id, &token)
        .await
        .expect("add token");
    token
}
