use crate::replay::clock::PlaybackClockHandle;
use crate::replay::engine::PlaybackEngine;
use crate::replay::store::SqliteTimeSeriesStore;
use crate::replay::types::{PlaybackClockStatus, DEFAULT_SYMBOL};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct AppState {
    pub started_at: Instant,
    pub db_pool: SqlitePool,
    pub playback_engine: Arc<Mutex<PlaybackEngine<SqliteTimeSeriesStore>>>,
    pub playback_clock: Mutex<Option<PlaybackClockHandle>>,
    pub clock_status: Arc<parking_lot::RwLock<PlaybackClockStatus>>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool) -> Self {
        let engine = PlaybackEngine::new(SqliteTimeSeriesStore::new(db_pool.clone()));
        let clock_status = PlaybackClockStatus::stopped(
            DEFAULT_SYMBOL.to_string(),
            String::new(),
            Some("playback idle".to_string()),
        );

        Self {
            started_at: Instant::now(),
            db_pool,
            playback_engine: Arc::new(Mutex::new(engine)),
            playback_clock: Mutex::new(None),
            clock_status: Arc::new(parking_lot::RwLock::new(clock_status)),
        }
    }
}
