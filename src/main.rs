//! Visual agent - browser front end for the Claude Code CLI
//!
//! Runs one agent process per turn, folds its stream-json output into a
//! live view model and serves that model over HTTP and SSE.

mod agent;
mod api;
mod config;
mod db;
mod project;
mod runtime;
mod session_cache;
mod settings;
mod state_machine;
mod transport;

use agent::ClaudeCli;
use api::{create_router, AppState};
use config::AppConfig;
use db::SessionStore;
use project::LocalFolderPicker;
use runtime::RuntimeDeps;
use settings::SettingsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visual_agent=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure data directories exist
    for path in [&config.db_path, &config.settings_path] {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    tracing::info!(path = %config.db_path.display(), "Opening session store");
    let sessions = SessionStore::open(&config.db_path)?;
    let settings = SettingsStore::new(&config.settings_path);

    let cli = match &config.claude_bin {
        Some(path) => ClaudeCli::new(path),
        None => ClaudeCli::locate("claude"),
    };

    let transport = runtime::spawn(RuntimeDeps {
        command: Arc::new(cli),
        sessions: sessions.clone(),
        settings: settings.clone(),
        default_model: config.default_model.clone(),
    });

    let state = AppState {
        transport,
        sessions,
        settings,
        folders: Arc::new(LocalFolderPicker),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!(%addr, model = %config.default_model, "Visual agent listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
