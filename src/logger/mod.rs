//! Logger module
//!
//! Logging helpers for the server, emitted as `tracing` events:
//! - Server lifecycle logging
//! - Access logging with multiple formats (target `access`)
//! - Error and warning logging
//! - Optional file targets for access and error logs

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use std::net::SocketAddr;
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use writer::Fallback;

const ACCESS_TARGET: &str = "access";

/// Initialize the global subscriber with configuration
///
/// Should be called once at application startup. `RUST_LOG` takes precedence
/// over `logging.level`.
pub fn init(config: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)?,
    };

    let access_writer = writer::make_writer(
        config.logging.access_log_file.as_deref(),
        Fallback::Stdout,
    )?;
    let error_writer = writer::make_writer(
        config.logging.error_log_file.as_deref(),
        Fallback::Stderr,
    )?;

    let access_layer = tracing_subscriber::fmt::layer()
        .with_writer(access_writer)
        .with_target(false)
        .with_level(false)
        .without_time()
        .with_filter(filter_fn(|meta| meta.target() == ACCESS_TARGET));
    let app_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_writer)
        .with_filter(filter_fn(|meta| meta.target() != ACCESS_TARGET));

    tracing_subscriber::registry()
        .with(filter)
        .with(access_layer)
        .with(app_layer)
        .try_init()?;
    Ok(())
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        addr = %addr,
        level = %config.logging.level,
        workers = ?config.server.workers,
        video_dir = %config.storage.video_dir,
        max_upload_bytes = config.storage.max_upload_bytes,
        "server listening on http://{addr}"
    );
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("access log: {path}");
    }
    if let Some(ref path) = config.logging.error_log_file {
        tracing::info!("error log: {path}");
    }
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!(peer = %peer_addr, "connection accepted");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("failed to serve connection: {err:?}");
}

pub fn log_info(message: &str) {
    tracing::info!("{message}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: ACCESS_TARGET, "{}", entry.format(format));
}

pub fn log_shutdown(active_connections: usize) {
    tracing::info!(active_connections, "shutdown requested, no longer accepting connections");
}
