//! Lingo Tutor - Telegram English study bot
//!
//! Turns English passages and article links into reading guides, then runs
//! a writing practice cycle of questions and critiques on top of them.

mod api;
mod article;
mod classifier;
mod config;
mod db;
mod llm;
mod runtime;
mod state_machine;
mod telegram;
mod telemetry;
mod text;
mod tutor;

use api::{create_router, AppState};
use article::HttpArticleFetcher;
use config::Config;
use db::Database;
use llm::{GeminiService, LoggingService};
use runtime::{DatabaseSessionStore, ProductionRuntime, ServiceLlmClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use telemetry::LangfuseClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lingo_tutor=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    spawn_purge(db.clone());

    let gemini = GeminiService::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.limits.llm_timeout,
    )?;
    let llm = ServiceLlmClient::new(Arc::new(LoggingService::new(Arc::new(gemini))));

    let telemetry = match &config.langfuse {
        Some(langfuse) => {
            tracing::info!(base_url = %langfuse.base_url, "Telemetry enabled");
            Some(LangfuseClient::new(langfuse)?)
        }
        None => {
            tracing::info!("Telemetry disabled; set LANGFUSE_PUBLIC_KEY and LANGFUSE_SECRET_KEY");
            None
        }
    };

    let runtime: ProductionRuntime = ProductionRuntime::new(
        &config,
        DatabaseSessionStore::new(db, config.limits.max_history(), config.limits.session_ttl),
        llm,
        HttpArticleFetcher::new(&config.limits)?,
        TelegramClient::new(&config.telegram_token, &config.limits)?,
        telemetry,
    );

    let state = AppState::new(Arc::new(runtime), &config.webhook_secret);
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(model = %config.gemini_model, "Lingo tutor listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired sessions
fn spawn_purge(db: Database) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match db.purge_expired() {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Purged expired sessions"),
                Err(e) => tracing::error!(error = %e, "Session purge failed"),
            }
        }
    });
}
