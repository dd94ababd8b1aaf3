mod anthropic;    // Anthropic Messages API client
mod config;       // Configuration from environment variables
mod error;        // Error types
mod handlers;     // HTTP handlers for the chat protocol
mod mcp;          // MCP server connections, tool catalog and routing
mod models;       // Request/response and chat protocol types
mod orchestrator; // Tool selection and result formatting pipeline

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::anthropic::{AnthropicClient, LanguageModel};
use crate::config::Config;
use crate::handlers::{router, AppState};
use crate::mcp::{McpManager, McpServersConfig, WebSocketConnector};
use crate::orchestrator::{OrchestratorSettings, QueryOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcp_query_router=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration. Make sure ANTHROPIC_API_KEY and SMITHERY_API_KEY are set. Error: {}",
            e
        )
    })?;

    let servers = match &config.mcp_config_path {
        Some(path) => McpServersConfig::load(path)?,
        None => McpServersConfig::default(),
    };

    info!("Starting MCP query router");
    info!("Using model: {}", config.model);
    info!("Configured MCP servers: {}", servers.servers.len());

    let mcp = Arc::new(McpManager::new(
        servers,
        config.platform(),
        Arc::new(WebSocketConnector),
    ));
    let llm: Arc<dyn LanguageModel> = Arc::new(AnthropicClient::new(config.clone())?);
    let orchestrator =
        QueryOrchestrator::new(llm, mcp.clone(), OrchestratorSettings::from_config(&config));

    let app = router(AppState::new(orchestrator, mcp.clone()));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing MCP sessions");
    mcp.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
