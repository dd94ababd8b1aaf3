use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::QueryError;
use crate::anthropic::LanguageModel;
use crate::mcp::{CallError, McpManager};
use crate::models::{ContentBlock, Message, MessageRequest, ToolSpec};

pub const NO_TOOL_RESPONSE: &str = "No response received from the tool.";

/// What to do when one selection response asks for several tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiCallPolicy {
    /// Run every requested call and keep only the last result.
    #[default]
    KeepLast,
    /// Run calls until one produces a result and ignore the rest.
    StopAtFirst,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub selection_max_tokens: u32,
    pub format_max_tokens: u32,
    pub tool_timeout: Duration,
    pub multi_call: MultiCallPolicy,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            selection_max_tokens: config.selection_max_tokens,
            format_max_tokens: config.format_max_tokens,
            tool_timeout: config.tool_timeout,
            multi_call: MultiCallPolicy::default(),
        }
    }
}

/// Answers a query in two model calls: one to pick a tool, one to format
/// what the tool returned.
pub struct QueryOrchestrator {
    llm: Arc<dyn LanguageModel>,
    mcp: Arc<McpManager>,
    settings: OrchestratorSettings,
}

impl QueryOrchestrator {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        mcp: Arc<McpManager>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { llm, mcp, settings }
    }

    pub async fn answer(&self, query: &str) -> Result<String, QueryError> {
        let tools: Vec<ToolSpec> = self.mcp.tools().await.iter().map(ToolSpec::from).collect();
        info!("Selecting among {} tools", tools.len());

        let request = MessageRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.selection_max_tokens,
            messages: vec![Message::user(query)],
            tools: if tools.is_empty() { None } else { Some(tools) },
        };
        let response = self.llm.create_message(request).await?;

        let mut tool_response: Option<String> = None;

        for block in response.content {
            let (name, input) = match block {
                ContentBlock::ToolUse { id, name, input } => {
                    debug!("Model requested tool {} ({})", name, id);
                    (name, input)
                }
                ContentBlock::Text { .. } | ContentBlock::Unknown => continue,
            };

            if self.settings.multi_call == MultiCallPolicy::StopAtFirst && tool_response.is_some() {
                debug!("Skipping additional tool call {}", name);
                break;
            }

            let Some(server) = self.mcp.resolve(&name).await else {
                debug!("No server provides tool {}; ignoring", name);
                continue;
            };

            info!("Calling tool {} from {}", name, server);
            match self
                .mcp
                .call_tool(&server, &name, input, self.settings.tool_timeout)
                .await
            {
                Ok(result) => tool_response = Some(result.text()),
                Err(CallError::Timeout(after)) => {
                    warn!("Tool {} on {} timed out after {:?}", name, server, after);
                    return Err(QueryError::ToolTimeout { tool: name });
                }
                Err(CallError::Failed(e)) => {
                    warn!("Tool {} on {} failed: {:#}", name, server, e);
                    return Err(QueryError::ToolInvocation {
                        tool: name,
                        message: format!("{:#}", e),
                    });
                }
            }
        }

        match tool_response.filter(|text| !text.is_empty()) {
            Some(raw) => self.format(raw).await,
            None => Ok(NO_TOOL_RESPONSE.to_string()),
        }
    }

    async fn format(&self, raw: String) -> Result<String, QueryError> {
        let request = MessageRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.format_max_tokens,
            messages: vec![Message::user(format_prompt(&raw))],
            tools: None,
        };
        let response = self.llm.create_message(request).await?;

        let formatted = response
            .first_text()
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string);

        match formatted {
            Some(text) => Ok(text),
            None => {
                warn!("Formatting returned no text; using raw tool output");
                Ok(raw)
            }
        }
    }
}

fn format_prompt(raw: &str) -> String {
    format!(
        "Please format the following response in a clear, user-friendly way. \
Do not add any additional information or knowledge, just format what is provided: {raw} \
Instructions: \
1. If the response contains multiple records (like clinical trials), present ALL records in a clear format, \
do not say something like \"Saved to a CSV file\" or anything similar. \
2. Use appropriate headings and sections \
3. Maintain all the original information \
4. Do not add any external knowledge or commentary \
5. Do not summarize or modify the content \
6. Keep the formatting simple and clean \
7. If the response mentions a CSV file, do not include that information in the response. \
8. For long responses, ensure all records are shown, not just a subset"
    )
}
