use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::api::ApiClient;
use crate::config::Config;
use crate::routes::posts::PreviewCache;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub api: ApiClient,
    pub previews: Arc<Mutex<PreviewCache>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, api: ApiClient) -> Self {
        Self {
            db,
            config,
            api,
            previews: Arc::new(Mutex::new(PreviewCache::default())),
        }
    }
}
