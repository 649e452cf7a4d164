use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

use crate::error::StoreError;

pub type DbPool = Pool<AsyncPgConnection>;

/// Connections held open per process.
pub const MAX_POOL_SIZE: usize = 20;

/// Build the connection pool backing [`super::pg::PgStore`]. Connections are
/// opened lazily, so a bad URL surfaces on the first query.
pub fn connect(database_url: &str) -> Result<DbPool, StoreError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder(manager).max_size(MAX_POOL_SIZE).build()?;
    tracing::info!(max_size = MAX_POOL_SIZE, "database pool created");
    Ok(pool)
}
