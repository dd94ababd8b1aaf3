//! Scripted stand-ins for tool servers and the language model.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::anthropic::LanguageModel;
use crate::error::AgentError;
use crate::mcp::connection::{Connector, Transport};
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::models::{ContentBlock, MessageRequest, MessageResponse};

#[derive(Debug, Clone)]
pub enum ToolBehavior {
    Text(String),
    Content(Value),
    ToolError(String),
    RpcError(String),
    Hang,
    Disconnect,
}

#[derive(Default)]
struct ServerState {
    tools: Vec<(String, ToolBehavior)>,
    page_size: Option<usize>,
    fail_initialize: bool,
    methods: Vec<String>,
    calls: Vec<(String, Value)>,
    closes: usize,
    closed: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedServer {
    state: Arc<Mutex<ServerState>>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(self, name: &str, behavior: ToolBehavior) -> Self {
        self.state
            .lock()
            .unwrap()
            .tools
            .push((name.to_string(), behavior));
        self
    }

    pub fn with_page_size(self, size: usize) -> Self {
        self.state.lock().unwrap().page_size = Some(size);
        self
    }

    pub fn failing_initialize(self) -> Self {
        self.state.lock().unwrap().fail_initialize = true;
        self
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(ScriptedTransport {
            state: self.state.clone(),
        })
    }

    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().methods.clone()
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

fn rpc_success(id: u64, result: Value) -> JsonRpcResponse {
    serde_json::from_value(json!({"jsonrpc": "2.0", "id": id, "result": result})).unwrap()
}

fn rpc_failure(id: u64, code: i64, message: &str) -> JsonRpcResponse {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    }))
    .unwrap()
}

enum Reply {
    Respond(JsonRpcResponse),
    Hang,
    Disconnect,
}

struct ScriptedTransport {
    state: Arc<Mutex<ServerState>>,
}

impl ScriptedTransport {
    fn plan(&self, request: &JsonRpcRequest) -> Result<Reply> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            anyhow::bail!("Transport is closed");
        }
        state.methods.push(request.method().to_string());
        let id = request.id();
        let params = serde_json::to_value(request).unwrap()["params"].clone();

        let reply = match request.method() {
            "initialize" if state.fail_initialize => {
                Reply::Respond(rpc_failure(id, -32603, "handshake rejected"))
            }
            "initialize" => Reply::Respond(rpc_success(
                id,
                json!({"protocolVersion": "2025-03-26", "capabilities": {"tools": {}}}),
            )),
            "tools/list" => {
                let start = params
                    .get("cursor")
                    .and_then(|c| c.as_str())
                    .and_then(|c| c.parse::<usize>().ok())
                    .unwrap_or(0);
                let end = match state.page_size {
                    Some(size) => (start + size).min(state.tools.len()),
                    None => state.tools.len(),
                };
                let tools: Vec<Value> = state.tools[start..end]
                    .iter()
                    .map(|(name, _)| {
                        json!({
                            "name": name,
                            "description": format!("{} tool", name),
                            "inputSchema": {"type": "object"}
                        })
                    })
                    .collect();
                let mut result = json!({ "tools": tools });
                if end < state.tools.len() {
                    result["nextCursor"] = json!(end.to_string());
                }
                Reply::Respond(rpc_success(id, result))
            }
            "tools/call" => {
                let name = params["name"].as_str().unwrap_or_default().to_string();
                state.calls.push((name.clone(), params["arguments"].clone()));
                let behavior = state
                    .tools
                    .iter()
                    .find(|(tool, _)| *tool == name)
                    .map(|(_, behavior)| behavior.clone());

                match behavior {
                    Some(ToolBehavior::Text(text)) => Reply::Respond(rpc_success(
                        id,
                        json!({"content": [{"type": "text", "text": text}]}),
                    )),
                    Some(ToolBehavior::Content(content)) => Reply::Respond(
                        rpc_success(id, json!({ "content": content })),
                    ),
                    Some(ToolBehavior::ToolError(text)) => Reply::Respond(rpc_success(
                        id,
                        json!({"content": [{"type": "text", "text": text}], "isError": true}),
                    )),
                    Some(ToolBehavior::RpcError(message)) => {
                        Reply::Respond(rpc_failure(id, -32000, &message))
                    }
                    Some(ToolBehavior::Hang) => Reply::Hang,
                    Some(ToolBehavior::Disconnect) => {
                        state.closed = true;
                        Reply::Disconnect
                    }
                    None => Reply::Respond(rpc_failure(id, -32602, "Unknown tool")),
                }
            }
            _ => Reply::Respond(rpc_failure(id, -32601, "Method not found")),
        };
        Ok(reply)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        match self.plan(request)? {
            Reply::Respond(response) => Ok(response),
            Reply::Hang => std::future::pending().await,
            Reply::Disconnect => anyhow::bail!("Server closed the connection unexpectedly"),
        }
    }

    async fn notify(&mut self, notification: &JsonRpcNotification) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            anyhow::bail!("Transport is closed");
        }
        let method = serde_json::to_value(notification).unwrap()["method"].clone();
        state.methods.push(method.as_str().unwrap_or_default().to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        state.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

/// Connector that hands out scripted transports and refuses unknown servers.
#[derive(Default)]
pub struct FakeConnector {
    servers: HashMap<String, ScriptedServer>,
    open_delay: Option<Duration>,
    opens: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, name: &str, server: ScriptedServer) -> Self {
        self.servers.insert(name.to_string(), server);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, server: &str, _url: &Url) -> Result<Box<dyn Transport>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        match self.servers.get(server) {
            Some(scripted) => Ok(scripted.transport()),
            None => anyhow::bail!("Connection refused: {}", server),
        }
    }
}

/// Language model that replays canned responses and records requests.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<MessageResponse, AgentError>>>,
    requests: Mutex<Vec<MessageRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<MessageResponse, AgentError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<MessageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn create_message(&self, request: MessageRequest) -> Result<MessageResponse, AgentError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::RequestFailed("no scripted response".to_string())))
    }
}

pub fn response(content: Vec<ContentBlock>) -> MessageResponse {
    MessageResponse {
        id: "msg_test".to_string(),
        model: "claude-test".to_string(),
        content,
        stop_reason: Some("end_turn".to_string()),
        usage: None,
    }
}

pub fn text_block(text: &str) -> ContentBlock {
    ContentBlock::Text {
        text: text.to_string(),
    }
}

pub fn tool_use_block(name: &str, input: Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: format!("toolu_{}", name),
        name: name.to_string(),
        input,
    }
}

pub fn config(anthropic_base_url: &str) -> crate::config::Config {
    crate::config::Config {
        anthropic_api_key: "test-anthropic-key".to_string(),
        anthropic_base_url: anthropic_base_url.to_string(),
        anthropic_version: "2023-06-01".to_string(),
        model: "claude-test".to_string(),
        smithery_api_key: "test-smithery-key".to_string(),
        smithery_base_url: "wss://tools.example".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        mcp_config_path: None,
        tool_timeout: Duration::from_secs(30),
        selection_max_tokens: 1000,
        format_max_tokens: 2000,
    }
}
