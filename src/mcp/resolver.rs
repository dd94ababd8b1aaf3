use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::mcp::types::{McpServersConfig, PlatformConfig};

/// Merges the shared base config with each server's overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    base: Map<String, Value>,
    overrides: HashMap<String, Map<String, Value>>,
}

impl ConfigResolver {
    pub fn new(config: &McpServersConfig) -> Self {
        Self {
            base: config.base_config.clone(),
            overrides: config
                .servers
                .iter()
                .map(|s| (s.identifier.clone(), s.override_config.clone()))
                .collect(),
        }
    }

    /// Override keys win; unknown servers get the base config alone.
    pub fn resolve(&self, server: &str) -> Map<String, Value> {
        let mut merged = self.base.clone();
        if let Some(overrides) = self.overrides.get(server) {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    pub fn encode(&self, server: &str) -> Result<String> {
        let json = serde_json::to_vec(&Value::Object(self.resolve(server)))?;
        Ok(STANDARD.encode(json))
    }

    pub fn server_url(&self, platform: &PlatformConfig, server: &str) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}/ws",
            platform.base_url.trim_end_matches('/'),
            server
        ))
        .with_context(|| format!("Invalid server URL for {}", server))?;

        url.query_pairs_mut()
            .append_pair("config", &self.encode(server)?)
            .append_pair("api_key", &platform.api_key);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::ServerDescriptor;
    use serde_json::json;

    fn resolver() -> ConfigResolver {
        let mut pubmed = ServerDescriptor::new("@x/pubmed");
        pubmed.override_config.insert("ignoreRobotsTxt".into(), json!(false));
        pubmed.override_config.insert("maxResults".into(), json!(50));

        let mut base = Map::new();
        base.insert("ignoreRobotsTxt".into(), json!(true));
        base.insert("region".into(), json!("us"));

        ConfigResolver::new(&McpServersConfig {
            base_config: base,
            servers: vec![pubmed, ServerDescriptor::new("@x/plain")],
        })
    }

    #[test]
    fn overrides_take_precedence() {
        let merged = resolver().resolve("@x/pubmed");
        assert_eq!(merged["ignoreRobotsTxt"], json!(false));
        assert_eq!(merged["maxResults"], json!(50));
        assert_eq!(merged["region"], json!("us"));
    }

    #[test]
    fn unknown_server_gets_base_config() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("@x/unknown"), resolver.resolve("@x/plain"));
        assert_eq!(resolver.resolve("@x/unknown").len(), 2);
    }

    #[test]
    fn encoding_is_reversible() {
        let resolver = resolver();
        let encoded = resolver.encode("@x/pubmed").unwrap();
        let decoded: Value = serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, Value::Object(resolver.resolve("@x/pubmed")));
    }

    #[test]
    fn url_carries_config_and_credential() {
        let platform = PlatformConfig {
            base_url: "wss://server.smithery.ai/".to_string(),
            api_key: "key+1".to_string(),
        };
        let resolver = resolver();
        let url = resolver.server_url(&platform, "@x/pubmed").unwrap();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/@x/pubmed/ws");

        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["api_key"], "key+1");
        assert_eq!(pairs["config"], resolver.encode("@x/pubmed").unwrap());
    }
}
