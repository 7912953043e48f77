use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use vidstream::config::{AppState, Config};
use vidstream::server::{self, Shutdown};
use vidstream::{backup, logger};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg).map_err(|e| e as Box<dyn std::error::Error>)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("Using {workers} worker threads"));
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let state = Arc::new(AppState::new(&cfg).await?);
    let active_connections = Arc::new(AtomicUsize::new(0));
    let shutdown = Arc::new(Shutdown::new());
    server::start_signal_handler(Arc::clone(&shutdown));

    if cfg.backup.enabled {
        backup::spawn_daily(Arc::clone(&state));
    }

    logger::log_server_start(&addr, &cfg);

    // Connections are served with spawn_local
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            server::start_server_loop(listener, state, Arc::clone(&active_connections), shutdown)
                .await?;
            server::drain_connections(&active_connections, SHUTDOWN_GRACE).await;
            Ok::<(), Box<dyn std::error::Error>>(())
        })
        .await
}
