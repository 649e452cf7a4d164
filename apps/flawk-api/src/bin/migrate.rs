//! Applies the embedded Postgres migrations for the users, active tokens and
//! notifications tables.
//!
//! Usage:
//!   cargo run -p flawk-api --bin flawk-migrate
//!   cargo run -p flawk-api --bin flawk-migrate -- --test
//!
//! `--test` targets `<database>_test`, the database the store tests run
//! against. Reads DATABASE_URL from the environment (or .env via dotenvy).

use std::path::Path;
use std::process::ExitCode;

use flawk_api::db::migrations::{run_pending, test_database_url};

fn main() -> ExitCode {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set; nothing to migrate");
        return ExitCode::FAILURE;
    };
    let database_url = if std::env::args().any(|arg| arg == "--test") {
        test_database_url(&database_url)
    } else {
        database_url
    };

    match run_pending(&database_url) {
        Ok(applied) if applied.is_empty() => println!("Schema is up to date."),
        Ok(applied) => {
            for version in &applied {
                println!("  applied {version}");
            }
            println!("{} migration(s) applied.", applied.len());
        }
        Err(e) => {
            eprintln!("migration failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
