use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use pullcache_engine::{Fetcher, OriginPull, Placer, Supervisor, TaskManager};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cli;
mod config;
mod error;
mod handler;
mod logging;
mod server;

use cli::CliArgs;
use config::ServerConfig;
use error::AppError;
use server::AppState;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if args.verbose {
        config.verbose = true;
    }
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    let config = config.normalized();

    let _log_guard = logging::init(Path::new(&config.log_path), config.verbose)?;

    info!("Origin-pull file cache v{}", env!("CARGO_PKG_VERSION"));
    info!(
        listen = %config.listen_addr(),
        root = %config.files_path,
        log = %config.log_path,
        dns = %config.dns_server,
        fail_fast = config.fail_fast,
        "Configuration loaded"
    );

    let root = config.files_root();
    tokio::fs::create_dir_all(&root).await?;

    let filters = config.filters()?;
    if filters.is_empty() {
        warn!("No origin filters configured, any Host header can trigger a download");
    }

    let fatal = CancellationToken::new();
    let fetcher = Fetcher::new(config.fetcher_config()?)?;
    let pipeline = Arc::new(OriginPull::new(fetcher, Placer::new()));
    let tasks = TaskManager::new(
        pipeline,
        Supervisor::new(config.failure_policy(), fatal.clone()),
    );

    let state = Arc::new(AppState {
        root,
        tasks,
        filters,
    });
    let app = server::router(state);

    let listener = TcpListener::bind(config.listen_addr()).await?;

    let shutdown = {
        let fatal = fatal.clone();
        async move {
            tokio::select! {
                _ = fatal.cancelled() => {}
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => info!("Shutdown requested"),
                    Err(e) => {
                        error!(error = %e, "Failed to listen for shutdown signal");
                        fatal.clone().cancelled_owned().await;
                    }
                },
            }
        }
    };

    server::serve(listener, app, shutdown).await?;

    if fatal.is_cancelled() {
        return Err(AppError::FatalShutdown);
    }
    info!("Server stopped");
    Ok(())
}
