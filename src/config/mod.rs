// Configuration module entry point
// Manages application configuration and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    BackupConfig, Config, DatabaseConfig, HttpConfig, LoggingConfig, PerformanceConfig,
    ServerConfig, SmtpConfig, SniffPolicy, StorageConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    ///
    /// Environment variables override the file, e.g. `VIDSTREAM_SMTP__PASSWORD`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("VIDSTREAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 120)?
            .set_default("performance.read_timeout", 1800)?
            .set_default("performance.write_timeout", 1800)?
            .set_default("http.server_name", "vidstream/0.1")?
            .set_default("http.enable_cors", true)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("http.static_dir", "../frontend/dist/browser")?
            .set_default("http.legacy_zero_end_range", false)?
            .set_default("storage.video_dir", "video")?
            .set_default("storage.max_upload_bytes", 2_147_483_648_u64)? // 2GB
            .set_default("storage.content_sniff", "warn")?
            .set_default("backup.enabled", false)?
            .set_default("backup.hour", 9)?
            .set_default("backup.minute", 0)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("does-not-exist/config").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.max_upload_bytes, 2 << 30);
        assert_eq!(cfg.storage.content_sniff, SniffPolicy::Warn);
        assert!(!cfg.http.legacy_zero_end_range);
        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.smtp.port, 587);
        assert_eq!(cfg.backup.hour, 9);
        assert!(cfg.get_socket_addr().is_ok());
    }
}
