//! Model Sidecar - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use model_sidecar::{
    DownloadWatcher, HfHub, SidecarConfig, SnapshotCache, SnapshotRefresher, WatcherState, api,
    download::{self, Transfer, TransferOptions},
    logging::{self, LogFormat},
    models::{self, DEFAULT_CONTEXT_LENGTH},
    status::HostSampler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "model-sidecar")]
#[command(about = "Sidecar utilities for a local model-serving host", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the request file and download requested models
    Watch {
        /// Also serve download progress over HTTP on this port
        #[arg(long)]
        status_port: Option<u16>,
    },
    /// Download one model file and serve its progress over HTTP
    Fetch {
        repo_id: String,
        filename: String,
        /// Override the models directory
        #[arg(long)]
        models_dir: Option<PathBuf>,
        /// Download progress port
        #[arg(long, default_value_t = 8081)]
        port: u16,
    },
    /// Serve cached host telemetry over HTTP
    Status {
        /// Override the status API port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the context length declared in a GGUF model file
    ContextLength {
        model_path: PathBuf,
        #[arg(default_value_t = DEFAULT_CONTEXT_LENGTH)]
        default: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.log_format);

    match cli.command {
        Command::ContextLength {
            model_path,
            default,
        } => {
            println!("{}", models::context_length_or(&model_path, default));
            Ok(())
        }
        Command::Watch { status_port } => {
            let mut config = SidecarConfig::load(cli.config)?;
            if status_port.is_some() {
                config.download_status_port = status_port;
            }
            config.validate()?;
            run_watcher(config).await
        }
        Command::Fetch {
            repo_id,
            filename,
            models_dir,
            port,
        } => {
            let mut config = SidecarConfig::load(cli.config)?;
            if let Some(dir) = models_dir {
                config.models_dir = dir;
            }
            config.download_status_port = Some(port);
            config.validate()?;
            run_fetch(config, &repo_id, &filename, port).await
        }
        Command::Status { port } => {
            let mut config = SidecarConfig::load(cli.config)?;
            if let Some(port) = port {
                config.status_port = port;
            }
            config.validate()?;
            run_status_server(config).await
        }
    }
}

async fn run_watcher(config: SidecarConfig) -> Result<()> {
    tracing::info!(
        config_dir = ?config.config_dir,
        models_dir = ?config.models_dir,
        download_status_port = ?config.download_status_port,
        "Starting download watcher"
    );

    config.ensure_dirs()?;

    let hub = Arc::new(HfHub::new(&config.hub_endpoint, config.hub_token.clone())?);
    let state = Arc::new(WatcherState::new(Some(config.status_file())));
    let watcher = Arc::new(DownloadWatcher::new(
        hub,
        state.clone(),
        config.request_file(),
        config.models_dir.clone(),
        config.poll_interval(),
    ));

    watcher.prepare().await;

    let server_handle = match config.download_status_port {
        Some(port) => Some(spawn_download_server(state.clone(), port).await?),
        None => None,
    };

    tokio::select! {
        _ = watcher.clone().run() => {},
        _ = shutdown_signal() => {},
    }

    tracing::info!("Shutting down...");
    watcher.shutdown().await;

    if let Some(handle) = server_handle {
        handle.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_fetch(config: SidecarConfig, repo_id: &str, filename: &str, port: u16) -> Result<()> {
    std::fs::create_dir_all(&config.models_dir)
        .with_context(|| format!("Cannot create directory: {:?}", config.models_dir))?;

    let hub = HfHub::new(&config.hub_endpoint, config.hub_token.clone())?;
    let state = Arc::new(WatcherState::new(Some(config.fetch_status_file())));
    let server_handle = spawn_download_server(state.clone(), port).await?;

    let transfer = Transfer {
        hub: &hub,
        sink: state.as_ref(),
        cancel: state.cancel_flag(),
        models_dir: &config.models_dir,
        options: TransferOptions::default(),
    };

    let outcome = tokio::select! {
        outcome = download::fetch_if_missing(&transfer, repo_id, filename) => outcome,
        _ = shutdown_signal() => {
            server_handle.abort();
            return Ok(());
        }
    };

    if !outcome.is_completed() {
        server_handle.abort();
        anyhow::bail!("{}", state.current().await.message);
    }

    // Keep serving the final status until asked to stop
    shutdown_signal().await;
    server_handle.abort();
    Ok(())
}

async fn spawn_download_server(
    state: Arc<WatcherState>,
    port: u16,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = api::create_download_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind download status server")?;
    tracing::info!(addr = %addr, "Download status server listening");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Download status server error");
        }
    }))
}

async fn run_status_server(config: SidecarConfig) -> Result<()> {
    tracing::info!(
        status_port = config.status_port,
        models_dir = ?config.models_dir,
        "Starting status publisher"
    );

    let cache = Arc::new(SnapshotCache::new());
    let refresher = Arc::new(SnapshotRefresher::new(
        HostSampler::from_config(&config),
        cache.clone(),
        config.refresh_interval(),
    ));

    // Serve a populated snapshot from the first request on
    refresher.refresh().await;
    let refresher_handle = tokio::spawn(refresher.clone().run());

    let app = api::create_router(api::AppState { snapshots: cache });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.status_port));
    tracing::info!(addr = %addr, "Starting status API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind status API server")?;

    // Graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Status API server error")?;

    refresher_handle.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
