use crate::config::Config;
use crate::network::NetworkRegistry;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: SqlitePool,
    pub registry: Arc<NetworkRegistry>,
    pub shutdown: CancellationToken,
}
