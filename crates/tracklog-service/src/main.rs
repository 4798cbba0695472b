//! Tracklog Service - Background location tracker and HTTP API.
//!
//! Run with: `cargo run -p tracklog-service`

use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tracklog_core::{PushProvider, SampleQuery, SimulatedProvider, StartMode};
use tracklog_service::{AppState, Config, ProviderHandle, api, keepalive, ws};
use tracklog_store::Store;

mod service;

/// Tracklog Service - Background location tracker and HTTP REST API.
#[derive(Parser, Debug)]
#[command(name = "tracklog-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Drive tracking from a simulated route instead of host-posted fixes.
    #[arg(long, global = true)]
    simulate: bool,

    /// Do not start tracking on launch (wait for `POST /api/tracking/start`).
    #[arg(long, global = true)]
    no_autostart: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service in the foreground (default behavior).
    Run,

    /// Export all recorded samples as CSV, oldest first.
    Export {
        /// Output file (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the background service.
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
}

#[derive(Subcommand, Debug)]
enum ServiceAction {
    /// Install tracklog-service as a system service.
    Install {
        /// Install as user-level service (no root/admin required).
        #[arg(long)]
        user: bool,
    },

    /// Uninstall the tracklog-service system service.
    Uninstall {
        /// Uninstall user-level service.
        #[arg(long)]
        user: bool,
    },

    /// Start the tracklog-service system service.
    Start {
        /// Start user-level service.
        #[arg(long)]
        user: bool,
    },

    /// Stop the tracklog-service system service.
    Stop {
        /// Stop user-level service.
        #[arg(long)]
        user: bool,
    },

    /// Check the status of the tracklog-service.
    Status {
        /// Check user-level service status.
        #[arg(long)]
        user: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();

    match args.command.take() {
        Some(Command::Service { action }) => handle_service_action(action),
        Some(Command::Export { output }) => export(&args, output),
        Some(Command::Run) | None => run_server(args).await,
    }
}

fn handle_service_action(action: ServiceAction) -> anyhow::Result<()> {
    use service::{Level, ServiceStatus};

    let (action_name, result) = match action {
        ServiceAction::Install { user } => (
            "install",
            service::install(Level::from_user_flag(user), StartMode::Sticky),
        ),
        ServiceAction::Uninstall { user } => {
            ("uninstall", service::uninstall(Level::from_user_flag(user)))
        }
        ServiceAction::Start { user } => ("start", service::start(Level::from_user_flag(user))),
        ServiceAction::Stop { user } => ("stop", service::stop(Level::from_user_flag(user))),
        ServiceAction::Status { user } => match service::status(Level::from_user_flag(user)) {
            Ok(ServiceStatus::Running) => {
                println!("tracklog-service is running");
                return Ok(());
            }
            Ok(ServiceStatus::Stopped) => {
                println!("tracklog-service is stopped");
                return Ok(());
            }
            Ok(ServiceStatus::NotInstalled) => {
                println!("tracklog-service is not installed");
                return Ok(());
            }
            Err(e) => {
                eprintln!("Failed to get status: {}", e);
                return Err(e.into());
            }
        },
    };

    match result {
        Ok(()) => {
            println!("Successfully {}ed tracklog-service", action_name);
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to {} service: {}", action_name, e);
            Err(e.into())
        }
    }
}

/// Load configuration and apply CLI overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }
    if args.no_autostart {
        config.sampling.autostart = false;
    }

    config.validate()?;
    Ok(config)
}

fn export(args: &Args, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let store = Store::open(&config.storage.path)?;
    let query = SampleQuery::new().oldest_first();

    let count = match output {
        Some(path) => {
            let count = store.export_csv(&query, File::create(&path)?)?;
            eprintln!("Exported {} samples to {}", count, path.display());
            count
        }
        None => store.export_csv(&query, io::stdout().lock())?,
    };

    if count == 0 {
        eprintln!("No samples recorded yet");
    }
    Ok(())
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tracklog_service=info".parse()?)
                .add_directive("tracklog_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    // Open the database
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;

    // The host reports permission through the API; the simulator starts granted
    let provider = if args.simulate {
        info!("Using simulated location provider");
        ProviderHandle::Simulated(Arc::new(SimulatedProvider::default()))
    } else {
        ProviderHandle::Push(Arc::new(PushProvider::default()))
    };

    let keep_alive = keepalive::from_config(&config.keepalive);
    let autostart = config.sampling.autostart;
    let addr: SocketAddr = config.server.bind.parse()?;

    // Create application state
    let state = AppState::new(store, provider, keep_alive, config)?;

    if autostart {
        let mode = state.runner.activate().await;
        info!("Tracking started ({:?})", mode);
    } else {
        info!("Autostart disabled, waiting for POST /api/tracking/start");
    }

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    info!("Starting server on {}", addr);

    // Run the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping tracking before exit");
    state.runner.deactivate().await;

    Ok(())
}

/// Resolve on SIGINT, or SIGTERM from the service manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
