mod config;
mod directory;
mod messenger;
mod routes;
mod singleton;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use calmirror_core::store::FileStore;
use calmirror_core::sync::sweep;
use calmirror_core::{NotificationComposer, SyncCoordinator};
use calmirror_provider_google::GoogleConnector;

use crate::config::Settings;
use crate::directory::FileUserDirectory;
use crate::messenger::WebhookMessenger;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "calmirror-server")]
#[command(about = "Mirror Google calendars and post what changed to chat")]
#[command(version)]
struct Cli {
    /// Settings file (default: ~/.config/calmirror/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    // Ensure only one instance sweeps this data directory
    let _lock = singleton::acquire_lock(&settings.data_path())?;

    let directory = Arc::new(FileUserDirectory::new(settings.users_dir()));
    let connector = GoogleConnector::new(
        settings.sessions_dir(),
        settings.google.clone(),
        settings.request_timeout(),
    )?
    .with_page_size(settings.page_size);
    let composer = NotificationComposer::new(&settings.site_url)?;

    let http = reqwest::Client::builder()
        .timeout(settings.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let messenger = WebhookMessenger::new(http, settings.messenger_url.as_deref())
        .context("Invalid messenger_url")?;

    let coordinator = SyncCoordinator::new(
        Arc::new(connector),
        directory.clone(),
        Arc::new(FileStore::new(settings.store_dir())),
        Arc::new(composer),
        Arc::new(messenger),
    );
    let state = AppState::new(Arc::new(coordinator), directory);

    tokio::spawn(run_sweeps(state.clone(), settings.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen_addr))?;
    tracing::info!(addr = %settings.listen_addr, site = %settings.site_url, "calmirror-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("calmirror-server stopped");
    Ok(())
}

/// Sync every user and send due reminders, once per interval.
async fn run_sweeps(state: AppState, settings: Settings) {
    let mut interval = tokio::time::interval(settings.sync_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let coordinator = state.coordinator.clone();
        let actions = state.actions.clone();
        let result = sweep(
            state.directory.as_ref(),
            settings.page_size,
            settings.max_concurrent_syncs,
            move |account| {
                let coordinator = coordinator.clone();
                let actions = actions.clone();
                async move {
                    coordinator.sync(&account.user_id).await?;
                    actions.remind(&account.user_id).await?;
                    Ok(())
                }
            },
        )
        .await;

        match result {
            Ok(stats) => {
                tracing::info!(users = stats.users, failures = stats.failures, "sweep complete")
            }
            Err(e) => tracing::error!(error = %e, "sweep aborted"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
