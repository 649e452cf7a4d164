//! Embedded schema migrations, shared by `flawk-migrate` and the Postgres
//! store tests.

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("failed to connect: {0}")]
    Connect(#[from] diesel::ConnectionError),
    #[error("failed to apply migrations: {0}")]
    Apply(Box<dyn std::error::Error + Send + Sync>),
}

/// Apply every pending migration to `database_url`. Returns the versions
/// that were applied, oldest first.
///
/// Blocking; call from `spawn_blocking` inside a runtime.
pub fn run_pending(database_url: &str) -> Result<Vec<String>, MigrationError> {
    let mut conn = PgConnection::establish(database_url)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(MigrationError::Apply)?;
    Ok(applied.iter().map(|version| version.to_string()).collect())
}

/// The throwaway database used by the test suite: the configured database
/// name with `_test` appended, keeping any query string. Already-suffixed
/// URLs are returned unchanged.
pub fn test_database_url(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };

    let Some((prefix, db_name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if db_name.is_empty() || db_name.ends_with("_test") {
        return database_url.to_string();
    }

    match query {
        Some(query) => format!("{prefix}/{db_name}_test?{query}"),
        None => format!("{prefix}/{db_name}_test"),
    }
}
