use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::s3::StorageService;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub redis: RedisService,
    pub storage: StorageService,
    pub http: reqwest::Client,
    /// Caps concurrent ffmpeg child processes across all jobs.
    pub encode_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        redis: RedisService,
        storage: StorageService,
    ) -> Self {
        let encode_slots = Arc::new(Semaphore::new(config.max_ffmpeg_jobs));
        Self {
            config,
            db,
            redis,
            storage,
            http: reqwest::Client::new(),
            encode_slots,
        }
    }
}
