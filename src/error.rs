use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AgentError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AgentError::RequestFailed(_) => (StatusCode::BAD_GATEWAY, "REQUEST_FAILED"),
            AgentError::ApiError { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "API_ERROR",
            ),
            AgentError::ParseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PARSE_ERROR"),
            AgentError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Failures of a single query that the user gets to see.
///
/// The display strings are the user-facing text; the chat layer sends them
/// as-is.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Error: The MCP server did not respond. Please try again later.")]
    ToolTimeout { tool: String },

    #[error("Error calling tool {tool}: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("An error occurred while processing your query: {0}")]
    Unhandled(#[from] AgentError),
}

impl QueryError {
    /// The tool involved, if the failure came from a tool call.
    pub fn tool(&self) -> Option<&str> {
        match self {
            QueryError::ToolTimeout { tool } | QueryError::ToolInvocation { tool, .. } => {
                Some(tool)
            }
            QueryError::Unhandled(_) => None,
        }
    }
}
