use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{error, info};

use surveybot_completion::CompletionClient;
use surveybot_db::Database;
use surveybot_documents::DocumentSource;

use crate::api::{self, AppState};
use crate::config::Config;

pub async fn handle_serve(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let db_path = config.database_path();
    let db = Arc::new(Database::open_at(&db_path).context("Failed to initialize database")?);
    let completion: Arc<dyn CompletionClient> = Arc::new(
        config
            .completion_client()
            .context("Failed to configure completion client")?,
    );
    let documents: Arc<dyn DocumentSource> = Arc::new(config.document_source()?);

    let state = AppState {
        db,
        completion,
        documents,
        options: config.completion_options(),
    };
    let router = api::create_router(state, &config.server.cors_origins);

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;

    info!(addr = %addr, database = %db_path.display(), "API server listening");
    eprintln!();
    eprintln!(
        "  {} {}",
        "->".bright_green(),
        format!("Listening on http://{}/api/v1", addr).bold()
    );
    eprintln!("  {} Press {} to stop", "->".dimmed(), "Ctrl+C".bold());
    eprintln!();

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
