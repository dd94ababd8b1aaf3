use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AgentError;
use crate::mcp::PlatformConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub anthropic_version: String,
    pub model: String,
    pub smithery_api_key: String,
    pub smithery_base_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub mcp_config_path: Option<String>,
    pub tool_timeout: Duration,
    pub selection_max_tokens: u32,
    pub format_max_tokens: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, AgentError> {
        Ok(Self {
            anthropic_api_key: required("ANTHROPIC_API_KEY")?,
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            anthropic_version: env::var("ANTHROPIC_VERSION")
                .unwrap_or_else(|_| "2023-06-01".to_string()),
            model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
            smithery_api_key: required("SMITHERY_API_KEY")?,
            smithery_base_url: env::var("SMITHERY_BASE_URL")
                .unwrap_or_else(|_| "wss://server.smithery.ai".to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parsed("SERVER_PORT", 8000),
            mcp_config_path: env::var("MCP_CONFIG_PATH").ok(),
            tool_timeout: Duration::from_secs(parsed("TOOL_TIMEOUT_SECS", 30)),
            selection_max_tokens: parsed("SELECTION_MAX_TOKENS", 1000),
            format_max_tokens: parsed("FORMAT_MAX_TOKENS", 2000),
        })
    }

    pub fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            base_url: self.smithery_base_url.clone(),
            api_key: self.smithery_api_key.clone(),
        }
    }
}

fn required(name: &str) -> Result<String, AgentError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AgentError::ConfigError(format!(
            "{} must be set in the environment or .env file",
            name
        ))),
    }
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
