use anyhow::{Context, Result};
use clap::Parser;
use hifella::app::{Queues, build_state, open_sources};
use hifella::config::AppConfig;
use hifella::queue::QueueConfig;
use hifella::seed::seed_demo_data;
use hifella::web::build_router;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "hifella", version, about = "Hi-Fella events and accounts API server")]
struct Cli {
    /// Address to listen on, overrides HIFELLA_BIND_ADDR
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Seed demo locations and events on startup
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    config.seed_demo_data |= cli.seed;

    let sources = open_sources(config.database.clone()).context("failed to open datastore")?;
    if config.seed_demo_data {
        seed_demo_data(&sources).await.context("failed to seed demo data")?;
    }

    let queues = Queues::start(QueueConfig::default());
    let state = build_state(&sources, Some(&queues), config.is_local())
        .context("failed to initialize services")?;

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(
        bind_addr = %config.bind_addr,
        app_env = %config.app_env,
        database = %config.database.to_url(),
        "hifella API started"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    queues.shutdown().await;
    info!("hifella API stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hifella=debug,tower_http=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
