use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use flawk_api::config::Config;
use flawk_api::db::pg::PgStore;
use flawk_api::db::store::{MemoryStore, UserStore};
use flawk_api::routes::ApiDoc;
use flawk_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => match flawk_api::db::pool::connect(url) {
            Ok(pool) => Arc::new(PgStore::new(pool)),
            Err(e) => {
                tracing::error!(err = %e, "could not set up the database pool");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set, users and notifications are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        build_number = %config.build_number,
        socket_debug = config.socket_debug,
        "flawk-api configured"
    );

    let state = AppState::new(config, store);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(flawk_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "flawk-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutdown signal received");
}
