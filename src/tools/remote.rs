//! Remote tool adapters.
//!
//! Registry-published tools run on the package's own invocation endpoint;
//! the engine never evaluates fetched code. `RemoteTool` posts the request
//! params (plus any request env and factory config) to that endpoint and maps
//! the response back through the `Tool` contract.
//!
//! Expected response body:
//! `{"success": true, "output": ...}` or
//! `{"success": false, "error": {"kind": "config"|"validation"|"internal", "message": "..."}}`
//! (a bare string `error` is accepted and treated as untagged).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{EnvMap, Tool, ToolDescriptor, ToolError, ToolErrorKind, ToolFactory};

/// Execute-capable handle backed by a remote invocation endpoint.
#[derive(Debug, Clone)]
pub struct RemoteTool {
    descriptor: ToolDescriptor,
    invoke_url: String,
    client: reqwest::Client,
    /// Factory-supplied configuration, forwarded with every invocation.
    config: Option<Value>,
}

impl RemoteTool {
    pub fn new(descriptor: ToolDescriptor, invoke_url: String, client: reqwest::Client) -> Self {
        Self {
            descriptor,
            invoke_url,
            client,
            config: None,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn describe(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn execute(&self, params: Value, env: &EnvMap) -> Result<Value, ToolError> {
        let mut body = json!({ "params": params });
        if !env.is_empty() {
            body["env"] = serde_json::to_value(env)
                .map_err(|e| ToolError::internal(format!("env serialization: {}", e)))?;
        }
        if let Some(config) = &self.config {
            body["config"] = config.clone();
        }

        let response = self
            .client
            .post(&self.invoke_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::internal(format!("invocation request failed: {}", e)))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolError::internal(format!("invalid invocation response: {}", e)))?;

        if !status.is_success() {
            return Err(parse_remote_error(&payload).unwrap_or_else(|| {
                ToolError::internal(format!("invocation endpoint returned {}", status))
            }));
        }

        let success = payload
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if success {
            Ok(payload.get("output").cloned().unwrap_or(Value::Null))
        } else {
            Err(parse_remote_error(&payload)
                .unwrap_or_else(|| ToolError::untagged("tool reported failure")))
        }
    }
}

/// Map the endpoint's `error` field into a `ToolError`, preserving a declared
/// kind when the tool emits one.
fn parse_remote_error(payload: &Value) -> Option<ToolError> {
    let error = payload.get("error")?;
    if let Some(message) = error.as_str() {
        return Some(ToolError::untagged(message));
    }
    let message = error
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("tool reported failure")
        .to_string();
    let kind = match error.get("kind").and_then(|v| v.as_str()) {
        Some("config") => Some(ToolErrorKind::Config),
        Some("validation") => Some(ToolErrorKind::Validation),
        Some("internal") => Some(ToolErrorKind::Internal),
        _ => None,
    };
    Some(ToolError { kind, message })
}

/// Factory export backed by a remote endpoint that requires configuration.
#[derive(Debug, Clone)]
pub struct RemoteFactory {
    descriptor: ToolDescriptor,
    invoke_url: String,
    client: reqwest::Client,
    /// Config keys the manifest declares as required. Empty means the factory
    /// accepts a zero-argument build.
    required_config: Vec<String>,
}

impl RemoteFactory {
    pub fn new(
        descriptor: ToolDescriptor,
        invoke_url: String,
        client: reqwest::Client,
        required_config: Vec<String>,
    ) -> Self {
        Self {
            descriptor,
            invoke_url,
            client,
            required_config,
        }
    }
}

impl ToolFactory for RemoteFactory {
    fn describe(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    fn build(&self, config: Option<&Value>) -> Result<Arc<dyn Tool>, ToolError> {
        let tool = RemoteTool::new(
            self.descriptor.clone(),
            self.invoke_url.clone(),
            self.client.clone(),
        );

        if self.required_config.is_empty() {
            let tool = match config {
                Some(c) => tool.with_config(c.clone()),
                None => tool,
            };
            return Ok(Arc::new(tool));
        }

        let config = config.ok_or_else(|| {
            ToolError::config(format!(
                "{} is required but not provided",
                self.required_config.join(", ")
            ))
        })?;

        // A narrowed `{apiKey}` config satisfies any single required key.
        let map = config
            .as_object()
            .ok_or_else(|| ToolError::config("factory config must be a JSON object"))?;
        let satisfied = self.required_config.iter().all(|key| {
            map.contains_key(key) || (self.required_config.len() == 1 && map.contains_key("apiKey"))
        });
        if !satisfied {
            return Err(ToolError::config(format!(
                "{} is required but not provided",
                self.required_config.join(", ")
            )));
        }

        Ok(Arc::new(tool.with_config(config.clone())))
    }
}
