use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::mcp::connection::Transport;
use crate::mcp::lifecycle::Releasable;
use crate::mcp::protocol::{create_init_params, JsonRpcNotification, JsonRpcRequest};
use crate::mcp::types::{McpTool, ToolCallResult};

/// An initialized MCP conversation with one server.
pub struct McpSession {
    name: String,
    transport: Box<dyn Transport>,
    request_id: u64,
}

impl McpSession {
    pub fn new(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            transport,
            request_id: 0,
        }
    }

    async fn send_request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        self.request_id += 1;
        let request = JsonRpcRequest::new(self.request_id, method, params);
        debug!("[{}] -> {} (id {})", self.name, request.method(), request.id());

        let response = self.transport.send(&request).await?;
        response
            .into_result()
            .context(format!("MCP server '{}'", self.name))
    }

    pub async fn initialize(&mut self) -> Result<()> {
        let init_result = self
            .send_request("initialize", Some(create_init_params()))
            .await?;
        debug!("[{}] Initialize result: {:?}", self.name, init_result);

        self.transport
            .notify(&JsonRpcNotification::new("notifications/initialized", None))
            .await
    }

    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        let mut tools: Vec<McpTool> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page = self.send_request("tools/list", params).await?;

            if let Some(batch) = page.get("tools") {
                let batch: Vec<McpTool> = serde_json::from_value(batch.clone())
                    .with_context(|| format!("[{}] Malformed tool list", self.name))?;
                tools.extend(batch);
            }

            match page.get("nextCursor").and_then(|c| c.as_str()) {
                Some(next) if !next.is_empty() => cursor = Some(next.to_string()),
                _ => break,
            }
        }

        info!(
            "[{}] Discovered {} tools: {:?}",
            self.name,
            tools.len(),
            tools.iter().map(|t| &t.name).collect::<Vec<_>>()
        );
        Ok(tools)
    }

    pub async fn call_tool(&mut self, tool_name: &str, arguments: Value) -> Result<ToolCallResult> {
        let params = json!({
            "name": tool_name,
            "arguments": arguments
        });

        let result = self.send_request("tools/call", Some(params)).await?;
        serde_json::from_value(result).context("Malformed tools/call result")
    }

    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }
}

/// Session handle shared between the routing table and the resource stack.
#[derive(Clone)]
pub struct SharedSession {
    name: String,
    inner: Arc<Mutex<McpSession>>,
}

impl SharedSession {
    pub fn new(session: McpSession) -> Self {
        Self {
            name: session.name.clone(),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, McpSession> {
        self.inner.lock().await
    }
}

#[async_trait]
impl Releasable for SharedSession {
    fn label(&self) -> &str {
        &self.name
    }

    async fn release(&self) -> Result<()> {
        self.inner.lock().await.close().await
    }
}
