pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::store::UserStore;
use gateway::auth::Authenticator;
use gateway::fanout::Fanout;
use gateway::registry::ConnectionRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<Config>,
    pub sockets: Arc<ConnectionRegistry>,
    pub fanout: Arc<Fanout>,
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    /// Wire the gateway components around a store. The registry starts empty.
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Self {
        let sockets = Arc::new(ConnectionRegistry::new());
        let fanout = Arc::new(Fanout::new(sockets.clone()));
        let authenticator = Arc::new(Authenticator::new(config.jwt_secret.clone(), store.clone()));
        Self {
            store,
            config: Arc::new(config),
            sockets,
            fanout,
            authenticator,
        }
    }
}
