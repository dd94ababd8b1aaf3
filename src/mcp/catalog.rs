use std::collections::HashMap;

use crate::mcp::types::ToolDescriptor;

/// All tools from connected servers plus the name → server routing table.
///
/// Tool names are unique keys. Registering a name that already exists
/// replaces the earlier descriptor and reroutes it to the newer server.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    routes: HashMap<String, String>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn register(&mut self, descriptor: ToolDescriptor) {
        let previous = self.routes.insert(descriptor.name.clone(), descriptor.server.clone());
        match previous {
            Some(_) => {
                if let Some(slot) = self.tools.iter_mut().find(|t| t.name == descriptor.name) {
                    *slot = descriptor;
                }
            }
            None => self.tools.push(descriptor),
        }
    }

    /// Drops every tool routed to `server`.
    pub(super) fn evict_server(&mut self, server: &str) -> usize {
        let before = self.tools.len();
        self.tools.retain(|t| t.server != server);
        self.routes.retain(|_, owner| owner != server);
        before - self.tools.len()
    }

    pub(super) fn clear(&mut self) {
        self.tools.clear();
        self.routes.clear();
    }

    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn resolve(&self, tool_name: &str) -> Option<&str> {
        self.routes.get(tool_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
