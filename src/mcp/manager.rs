use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{error, info, warn};

use crate::mcp::catalog::ToolCatalog;
use crate::mcp::connection::Connector;
use crate::mcp::lifecycle::ResourceStack;
use crate::mcp::resolver::ConfigResolver;
use crate::mcp::session::{McpSession, SharedSession};
use crate::mcp::types::{
    McpServerInfo, McpServersConfig, PlatformConfig, ToolCallResult, ToolDescriptor,
};

#[derive(Error, Debug)]
pub enum CallError {
    #[error("tool call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Client context: every session, the tool catalog, and the resources to
/// release at shutdown. Connections are made once, on first use.
pub struct McpManager {
    connector: Arc<dyn Connector>,
    resolver: ConfigResolver,
    platform: PlatformConfig,
    config: McpServersConfig,
    sessions: RwLock<HashMap<String, SharedSession>>,
    catalog: RwLock<ToolCatalog>,
    resources: Mutex<ResourceStack>,
    initialized: OnceCell<()>,
}

impl McpManager {
    pub fn new(
        config: McpServersConfig,
        platform: PlatformConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            connector,
            resolver: ConfigResolver::new(&config),
            platform,
            config,
            sessions: RwLock::new(HashMap::new()),
            catalog: RwLock::new(ToolCatalog::new()),
            resources: Mutex::new(ResourceStack::new()),
            initialized: OnceCell::new(),
        }
    }

    /// Connects to every enabled server the first time it is called.
    /// Concurrent callers wait for that single attempt.
    pub async fn ensure_connected(&self) {
        self.initialized
            .get_or_init(|| async {
                let servers = self.config.enabled_identifiers();
                self.connect_all(&servers).await;
                if self.catalog.read().await.is_empty() {
                    warn!("No MCP tools available; queries will not reach any server");
                }
            })
            .await;
    }

    /// Connects to each server in order. A server that fails is logged and
    /// skipped; it never affects servers already registered.
    pub async fn connect_all(&self, servers: &[String]) {
        for name in servers {
            match self.connect_server(name).await {
                Ok(count) => info!("Connected to MCP server: {} ({} tools)", name, count),
                Err(e) => error!("Failed to connect to MCP server {}: {:#}", name, e),
            }
        }
    }

    async fn connect_server(&self, name: &str) -> Result<usize> {
        let url = self.resolver.server_url(&self.platform, name)?;
        info!("Connecting to MCP server: {}", name);

        let transport = self.connector.open(name, &url).await?;
        let session = SharedSession::new(McpSession::new(name, transport));

        let mut scope = ResourceStack::new();
        scope.push(Box::new(session.clone()));

        let setup = async {
            let mut guard = session.lock().await;
            guard.initialize().await.context("Handshake failed")?;
            guard.list_tools().await.context("Listing tools failed")
        }
        .await;

        let tools = match setup {
            Ok(tools) => tools,
            Err(e) => {
                scope.release_all().await;
                return Err(e);
            }
        };

        self.resources.lock().await.absorb(scope);
        self.sessions
            .write()
            .await
            .insert(name.to_string(), session);

        let count = tools.len();
        let mut catalog = self.catalog.write().await;
        for tool in tools {
            catalog.register(ToolDescriptor::from_tool(name, tool));
        }
        info!("Tool catalog now holds {} tools", catalog.len());
        Ok(count)
    }

    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.catalog.read().await.list_tools().to_vec()
    }

    pub async fn resolve(&self, tool_name: &str) -> Option<String> {
        self.catalog
            .read()
            .await
            .resolve(tool_name)
            .map(str::to_string)
    }

    /// Invokes `tool_name` on `server`, giving up after `timeout`.
    ///
    /// A failure that leaves the session's transport closed evicts the
    /// session and its tools from the catalog.
    pub async fn call_tool(
        &self,
        server: &str,
        tool_name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<ToolCallResult, CallError> {
        let session = self
            .sessions
            .read()
            .await
            .get(server)
            .cloned()
            .with_context(|| format!("Server {} not connected", server))?;

        // The deadline covers waiting for the session as well as the call.
        let outcome = tokio::time::timeout(timeout, async {
            let mut guard = session.lock().await;
            let result = guard.call_tool(tool_name, arguments).await;
            let closed = result.is_err() && guard.is_closed();
            (result, closed)
        })
        .await;

        match outcome {
            Err(_) => Err(CallError::Timeout(timeout)),
            Ok((Ok(result), _)) => {
                if result.is_error {
                    warn!("Tool {} on {} reported an error result", tool_name, server);
                }
                Ok(result)
            }
            Ok((Err(e), closed)) => {
                if closed {
                    self.evict(server).await;
                }
                Err(CallError::Failed(e))
            }
        }
    }

    async fn evict(&self, server: &str) {
        self.sessions.write().await.remove(server);
        let removed = self.catalog.write().await.evict_server(server);
        warn!(
            "MCP server {} disconnected; removed {} tools from the catalog",
            server, removed
        );
    }

    pub async fn server_status(&self) -> Vec<McpServerInfo> {
        let sessions = self.sessions.read().await;
        let catalog = self.catalog.read().await;

        self.config
            .servers
            .iter()
            .map(|server| {
                let tools: Vec<String> = catalog
                    .list_tools()
                    .iter()
                    .filter(|t| t.server == server.identifier)
                    .map(|t| t.name.clone())
                    .collect();

                McpServerInfo {
                    name: server.identifier.clone(),
                    enabled: !server.disabled,
                    connected: sessions.contains_key(&server.identifier),
                    tools_count: tools.len(),
                    tools,
                }
            })
            .collect()
    }

    /// Closes every opened session, newest first.
    pub async fn shutdown(&self) {
        let mut resources = self.resources.lock().await;
        info!("Closing {} MCP sessions", resources.len());
        let failures = resources.release_all().await;
        drop(resources);
        self.sessions.write().await.clear();
        self.catalog.write().await.clear();

        if failures.is_empty() {
            info!("All MCP sessions closed");
        } else {
            warn!("{} MCP sessions failed to close cleanly", failures.len());
        }
    }
}
