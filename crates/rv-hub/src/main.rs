use clap::Parser;
use rv_core::logfile::open_log_file;
use rv_hub::config::{load_config, Args};
use rv_hub::{router, HubConfig, HubState};
use std::{
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tracing::{error, info};
use tracing_subscriber::{
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
    EnvFilter,
};

#[tokio::main]
async fn main() {
    let config = load_config(Args::parse());
    init_logging(&config);
    let addr: SocketAddr = match config.addr.parse() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err, addr = %config.addr);
            return;
        }
    };

    let hub = Arc::new(HubState::new(config.clone()));
    let app = router(hub);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "hub_error", error = %err);
            return;
        }
    };

    info!(
        event = "hub_start",
        addr = %config.addr,
        history_capacity = config.history_capacity,
        announce_presence = config.announce_presence
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "hub_error", error = %err);
    }
    info!(event = "hub_stop");
}

/// Logs to stdout and, when a log dir is configured, `rv-hub.log` as well.
fn init_logging(config: &HubConfig) {
    let level = if config.debug {
        "debug".to_string()
    } else {
        std::env::var("RV_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file = match open_log_file(&config.log_dir, "rv-hub.log") {
        Ok(value) => value,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            None
        }
    };
    let (writer, ansi) = match file {
        Some(file) => (BoxMakeWriter::new(io::stdout.and(Mutex::new(file))), false),
        None => (BoxMakeWriter::new(io::stdout), true),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_writer(writer)
        .try_init();
}
