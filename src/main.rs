use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lapsecam::camera::{CaptureController, V4l2Camera};
use lapsecam::config::AppConfig;
use lapsecam::state::AppState;
use lapsecam::storage::FrameStore;
use lapsecam::timelapse::VideoAssembler;
use lapsecam::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// lapsecam command line arguments
#[derive(Parser, Debug)]
#[command(name = "lapsecam")]
#[command(version, about = "HTTP-controlled photo-timelapse recorder", long_about = None)]
struct CliArgs {
    /// Listen address
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Camera device path (default: /dev/video0)
    #[arg(long, value_name = "DEVICE")]
    device: Option<PathBuf>,

    /// Directory for captured frames (default: data/captures)
    #[arg(long, value_name = "DIR")]
    captures_dir: Option<PathBuf>,

    /// Directory for assembled videos (default: data/videos)
    #[arg(long, value_name = "DIR")]
    videos_dir: Option<PathBuf>,

    /// Encoder binary used for video assembly (default: ffmpeg)
    #[arg(long, value_name = "BIN")]
    ffmpeg: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Increase verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting lapsecam v{}", env!("CARGO_PKG_VERSION"));

    // Apply CLI argument overrides to config (only if explicitly specified)
    let mut config = AppConfig::default();
    if let Some(addr) = args.address {
        config.web.bind_address = addr;
    }
    if let Some(port) = args.port {
        config.web.http_port = port;
    }
    if let Some(device) = args.device {
        config.camera.device = device;
    }
    if let Some(dir) = args.captures_dir {
        config.storage.captures_dir = dir;
    }
    if let Some(dir) = args.videos_dir {
        config.storage.videos_dir = dir;
    }
    if let Some(bin) = args.ffmpeg {
        config.encoder.ffmpeg_bin = bin;
    }

    // Bootstrap the two persisted directories
    let store = FrameStore::new(&config.storage.captures_dir);
    store.ensure_dir().await?;
    tracing::info!("Captures directory: {}", store.dir().display());

    let assembler = Arc::new(VideoAssembler::new(
        store.clone(),
        &config.storage.videos_dir,
        &config.encoder.ffmpeg_bin,
    ));
    assembler.ensure_dir().await?;
    tracing::info!("Videos directory: {}", assembler.videos_dir().display());

    // The controller holds the only camera handle; the device itself is
    // opened lazily on first capture.
    let camera = V4l2Camera::new(&config.camera.device);
    let capture = Arc::new(CaptureController::new(Box::new(camera), store.clone()));

    let state = Arc::new(AppState::new(config.clone(), store, capture, assembler));

    let app = web::create_router(state.clone());

    let ip: IpAddr = config
        .web
        .bind_address
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {}: {}", config.web.bind_address, e))?;
    let addr = SocketAddr::new(ip, config.web.http_port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    // Setup graceful shutdown: ctrl-c broadcasts, the server drains
    // in-flight requests, then the camera is released exactly once.
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if let Err(e) = run_server(listener, app, shutdown_rx).await {
        tracing::error!("HTTP server error: {}", e);
    }
    cleanup(&state).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve until the shutdown channel fires, then drain connections
async fn run_server(
    listener: tokio::net::TcpListener,
    app: axum::Router,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "lapsecam=error,tower_http=error",
        LogLevel::Warn => "lapsecam=warn,tower_http=warn",
        LogLevel::Info => "lapsecam=info,tower_http=info",
        LogLevel::Debug => "lapsecam=debug,tower_http=debug",
        LogLevel::Trace => "lapsecam=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Release the camera and stop any running session on shutdown
async fn cleanup(state: &AppState) {
    tracing::info!("Cleaning up before shutdown");
    if let Err(e) = state.capture.release().await {
        tracing::warn!("Failed to release camera: {}", e);
    }
}
