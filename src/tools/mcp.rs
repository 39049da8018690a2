//! Remote toolsets served by an HTTP tool server
//!
//! `GET {url}/mcp/{toolset}/tools` lists the tools with their `safe` flags;
//! `POST {url}/mcp/{toolset}/execute` runs one and answers `{result}` or
//! `{error}`. Requests carry a Bearer token when one is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Tool, ToolContext, ToolError, ToolOutput};

/// Client for one toolset on a tool server
#[derive(Debug)]
pub struct McpToolset {
    client: Client,
    base_url: String,
    toolset: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolListing {
    tools: Vec<RemoteToolSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct RemoteToolSpec {
    name: String,
    #[serde(default)]
    description: String,
    /// `{param: {type, description, required, default}}`
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    safe: bool,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    name: &'a str,
    arguments: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    result: Option<String>,
    error: Option<String>,
}

impl McpToolset {
    pub fn new(
        base_url: impl Into<String>,
        toolset: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        let toolset = toolset.into();
        let client = Client::builder().timeout(timeout).build().map_err(|e| ToolError::Remote {
            toolset: toolset.clone(),
            message: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            toolset,
            api_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.toolset
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/mcp/{}/{}", self.base_url, self.toolset, action)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn remote_error(&self, message: impl Into<String>) -> ToolError {
        ToolError::Remote {
            toolset: self.toolset.clone(),
            message: message.into(),
        }
    }

    /// Fetch the toolset's tools from the server
    pub async fn fetch_tools(self: Arc<Self>) -> Result<Vec<Arc<dyn Tool>>, ToolError> {
        let response = self
            .authorize(self.client.get(self.endpoint("tools")))
            .send()
            .await
            .map_err(|e| self.remote_error(format!("listing tools failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.remote_error(format!("listing tools returned {}: {}", status, body)));
        }

        let listing: ToolListing = response
            .json()
            .await
            .map_err(|e| self.remote_error(format!("invalid tool listing: {}", e)))?;

        info!("Toolset {} offers {} tools", self.toolset, listing.tools.len());
        Ok(listing
            .tools
            .into_iter()
            .map(|spec| {
                debug!("  {} {}", if spec.safe { "✓" } else { "⚠" }, spec.name);
                Arc::new(RemoteTool {
                    schema: parameters_to_schema(&spec.parameters),
                    spec,
                    toolset: Arc::clone(&self),
                }) as Arc<dyn Tool>
            })
            .collect())
    }

    async fn execute(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let response = self
            .authorize(self.client.post(self.endpoint("execute")))
            .json(&ExecuteRequest { name, arguments })
            .send()
            .await
            .map_err(|e| self.remote_error(format!("executing {} failed: {}", name, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.remote_error(format!("executing {} returned {}: {}", name, status, body)));
        }

        let reply: ExecuteResponse = response
            .json()
            .await
            .map_err(|e| self.remote_error(format!("invalid execute response: {}", e)))?;

        Ok(match (reply.result, reply.error) {
            (_, Some(error)) => ToolOutput::error(error),
            (Some(result), None) => ToolOutput::success(result),
            (None, None) => ToolOutput::success(""),
        })
    }
}

/// One tool of a remote toolset
struct RemoteTool {
    spec: RemoteToolSpec,
    schema: Value,
    toolset: Arc<McpToolset>,
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    fn safe(&self) -> bool {
        self.spec.safe
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput, eyre::Error> {
        let arguments = if input.is_null() { json!({}) } else { input };
        Ok(self.toolset.execute(&self.spec.name, &arguments).await?)
    }
}

/// Convert the server's flat parameter map to a JSON Schema object.
fn parameters_to_schema(parameters: &Map<String, Value>) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, def) in parameters {
        let mut property = Map::new();
        property.insert(
            "type".to_string(),
            def.get("type").cloned().unwrap_or_else(|| json!("string")),
        );
        for key in ["description", "default", "enum"] {
            if let Some(value) = def.get(key) {
                property.insert(key.to_string(), value.clone());
            }
        }
        properties.insert(name.clone(), Value::Object(property));

        if def.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(json!(name));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_to_schema() {
        let parameters = json!({
            "path": {"type": "string", "description": "File to read", "required": true},
            "max_lines": {"type": "number", "description": "Limit", "required": false, "default": 500}
        });
        let schema = parameters_to_schema(parameters.as_object().unwrap());

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["max_lines"]["default"], 500);
        assert!(schema["properties"]["path"].get("required").is_none());
        assert_eq!(schema["required"], json!(["path"]));
    }

    #[test]
    fn test_listing_deserializes() {
        let listing: ToolListing = serde_json::from_value(json!({
            "toolset": "gmail",
            "tools": [
                {"name": "search", "description": "Search mail", "parameters": {}, "safe": true},
                {"name": "send", "description": "Send mail", "parameters": {}, "safe": false}
            ]
        }))
        .unwrap();

        assert_eq!(listing.tools.len(), 2);
        assert!(listing.tools[0].safe);
        assert!(!listing.tools[1].safe);
    }

    #[test]
    fn test_endpoints() {
        let toolset = McpToolset::new("http://localhost:8000/", "system", None, Duration::from_secs(5)).unwrap();
        assert_eq!(toolset.endpoint("tools"), "http://localhost:8000/mcp/system/tools");
        assert_eq!(toolset.endpoint("execute"), "http://localhost:8000/mcp/system/execute");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_remote_error() {
        let toolset = Arc::new(McpToolset::new("http://127.0.0.1:9", "system", None, Duration::from_secs(2)).unwrap());
        let result = toolset.fetch_tools().await;
        assert!(matches!(result, Err(ToolError::Remote { .. })));
    }
}
