// Application state module
// Holds the loaded configuration and the collaborators every handler needs

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::backup::BackupMailer;
use crate::error::AppError;
use crate::logger;
use crate::users::{MemoryUserStore, MySqlUserStore, UserStore};
use crate::video::VideoStore;

/// Application state
pub struct AppState {
    pub config: Config,

    // Cached config values for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,

    pub videos: VideoStore,
    pub users: Arc<dyn UserStore>,
    /// `None` when SMTP is not configured
    pub mailer: Option<BackupMailer>,
}

impl AppState {
    /// Build state from configuration, connecting to the database if one is set
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let videos = VideoStore::open(&config.storage).await?;

        let users: Arc<dyn UserStore> = match config.database.url.as_deref() {
            Some(url) => Arc::new(MySqlUserStore::connect(url).await?),
            None => {
                logger::log_warning("database.url not set, users are kept in memory");
                Arc::new(MemoryUserStore::default())
            }
        };

        let mailer = BackupMailer::from_config(&config.smtp)?;
        if mailer.is_none() {
            logger::log_warning("SMTP is not configured, backup mail is disabled");
        }

        Ok(Self::with_parts(config, videos, users, mailer))
    }

    /// Assemble state from already-built collaborators
    pub fn with_parts(
        config: &Config,
        videos: VideoStore,
        users: Arc<dyn UserStore>,
        mailer: Option<BackupMailer>,
    ) -> Self {
        Self {
            config: config.clone(),
            cached_access_log: Arc::new(AtomicBool::new(config.logging.access_log)),
            videos,
            users,
            mailer,
        }
    }
}
