use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::mcp::McpManager;
use crate::models::{ChatAcknowledgement, ChatContent, ChatExchange, ChatMessage};
use crate::orchestrator::QueryOrchestrator;

/// Shared application state
pub struct AppState {
    pub orchestrator: QueryOrchestrator,
    pub mcp: Arc<McpManager>,
}

impl AppState {
    pub fn new(orchestrator: QueryOrchestrator, mcp: Arc<McpManager>) -> Arc<Self> {
        Arc::new(Self { orchestrator, mcp })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/chat", post(chat))
        .route("/v1/chat/acknowledgement", post(chat_acknowledgement))
        .route("/v1/tools", get(get_tools))
        .route("/v1/servers", get(get_servers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

/// Acknowledges the inbound message, then answers each text item in order.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(message): Json<ChatMessage>,
) -> Result<Json<ChatExchange>, AgentError> {
    if message.content.is_empty() {
        return Err(AgentError::InvalidRequest(
            "Chat message has no content".to_string(),
        ));
    }

    let acknowledgement = ChatAcknowledgement::for_message(&message);
    info!("Acknowledged message {}", message.msg_id);

    state.mcp.ensure_connected().await;

    let mut messages = Vec::new();
    for item in message.content {
        match item {
            ChatContent::StartSession => {
                info!("Got a start session message for {}", message.msg_id);
            }
            ChatContent::Text { text } => {
                info!("Got a message: {}", text);
                let response_text = match state.orchestrator.answer(&text).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!("Query failed (tool: {:?}): {}", e.tool(), e);
                        e.to_string()
                    }
                };
                info!("Response text: {}", response_text);
                messages.push(ChatMessage::text(response_text));
            }
            ChatContent::Unknown => {
                info!("Got unexpected content in {}", message.msg_id);
            }
        }
    }

    Ok(Json(ChatExchange {
        acknowledgement,
        messages,
    }))
}

pub async fn chat_acknowledgement(Json(ack): Json<ChatAcknowledgement>) -> impl IntoResponse {
    info!(
        "Received acknowledgement for message {}",
        ack.acknowledged_msg_id
    );
    if let Some(metadata) = &ack.metadata {
        info!("Metadata: {:?}", metadata);
    }
    axum::http::StatusCode::NO_CONTENT
}

/// Get available tools
pub async fn get_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools = state.mcp.tools().await;
    Json(serde_json::json!({
        "tools": tools.iter().map(|t| {
            serde_json::json!({
                "name": t.name,
                "description": t.description,
                "server": t.server,
                "input_schema": t.input_schema
            })
        }).collect::<Vec<_>>()
    }))
}

pub async fn get_servers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "servers": state.mcp.server_status().await }))
}
