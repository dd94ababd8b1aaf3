use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::path::Path;

/// Servers connected when no config file is given.
const DEFAULT_SERVERS: &[&str] = &[
    "@nickclyde/duckduckgo-mcp-server",
    "@JackKuo666/pubmed-mcp-server",
    "@openags/paper-search-mcp",
    "@JackKuo666/clinicaltrials-mcp-server",
    "@vitaldb/medcalc",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerDescriptor {
    #[serde(rename = "id")]
    pub identifier: String,
    #[serde(rename = "config", default)]
    pub override_config: Map<String, Value>,
    #[serde(default)]
    pub disabled: bool,
}

impl ServerDescriptor {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            override_config: Map::new(),
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServersConfig {
    #[serde(default = "default_base_config")]
    pub base_config: Map<String, Value>,
    pub servers: Vec<ServerDescriptor>,
}

fn default_base_config() -> Map<String, Value> {
    let mut base = Map::new();
    base.insert("ignoreRobotsTxt".to_string(), Value::Bool(true));
    base
}

impl Default for McpServersConfig {
    fn default() -> Self {
        Self {
            base_config: default_base_config(),
            servers: DEFAULT_SERVERS
                .iter()
                .map(|id| ServerDescriptor::new(*id))
                .collect(),
        }
    }
}

impl McpServersConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read MCP config {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let content = expand_env_vars(content)?;
        serde_json::from_str(&content).context("Invalid MCP server config")
    }

    /// Identifiers of enabled servers, in file order.
    pub fn enabled_identifiers(&self) -> Vec<String> {
        self.servers
            .iter()
            .filter(|s| !s.disabled)
            .map(|s| s.identifier.clone())
            .collect()
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{(\w+)\}")?;
    let expanded = re.replace_all(content, |caps: &regex::Captures| {
        env::var(&caps[1]).unwrap_or_default()
    });
    Ok(expanded.into_owned())
}

/// Where the hosted tool servers live and the credential they expect.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A tool as exposed to the language model, tagged with the server that owns it.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub server: String,
}

impl ToolDescriptor {
    pub fn from_tool(server: &str, tool: McpTool) -> Self {
        let description = match tool.description {
            Some(text) => format!("[{}] {}", server, text),
            None => format!("[{}]", server),
        };
        Self {
            name: tool.name,
            description,
            input_schema: tool.input_schema,
            server: server.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Value,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Flattens the payload to text: strings pass through, list items are
    /// joined line by line using their `text` field when present.
    pub fn text(&self) -> String {
        match &self.content {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item.get("text").and_then(|t| t.as_str()) {
                    Some(text) => text.to_string(),
                    None => match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct McpServerInfo {
    pub name: String,
    pub enabled: bool,
    pub connected: bool,
    pub tools_count: usize,
    pub tools: Vec<String>,
}
