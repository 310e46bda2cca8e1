//! Builtin in-process tools.
//!
//! These back the `@toolhost/*` packages without any registry round-trip and
//! serve as the reference implementations of the `Tool` contract.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{EnvMap, ModuleExports, RawExport, Tool, ToolDescriptor, ToolError};

/// Greeting tool used by the end-to-end smoke path.
#[derive(Debug, Default)]
pub struct HelloWorldTool;

#[async_trait]
impl Tool for HelloWorldTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            export_name: "helloWorldTool".to_string(),
            description: "Returns a friendly greeting with the current timestamp".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Name to greet (defaults to World)"
                    }
                },
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, params: Value, _env: &EnvMap) -> Result<Value, ToolError> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("World");

        Ok(json!({
            "message": format!("Hello, {}!", name),
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

/// Echo tool — returns its params verbatim. Handy for wiring checks.
#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            export_name: "echoTool".to_string(),
            description: "Echoes the supplied parameters back to the caller".to_string(),
            input_schema: json!({ "type": "object" }),
        }
    }

    async fn execute(&self, params: Value, _env: &EnvMap) -> Result<Value, ToolError> {
        Ok(json!({ "echo": params }))
    }
}

/// Builtin packages keyed by package name, registered into the static loader
/// ahead of the HTTP registry.
pub fn builtin_packages() -> Vec<(String, ModuleExports)> {
    let mut hello = ModuleExports::new();
    hello.insert(
        "helloWorldTool",
        RawExport::Handle(Arc::new(HelloWorldTool)),
    );

    let mut echo = ModuleExports::new();
    echo.insert("echoTool", RawExport::Handle(Arc::new(EchoTool)));

    vec![
        ("@toolhost/hello".to_string(), hello),
        ("@toolhost/echo".to_string(), echo),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hello_default_name() {
        let tool = HelloWorldTool;
        let out = tool
            .execute(json!({}), &EnvMap::new())
            .await
            .unwrap();
        assert_eq!(out["message"], "Hello, World!");
        // Timestamp must parse as RFC 3339
        let ts = out["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn test_hello_custom_name() {
        let tool = HelloWorldTool;
        let out = tool
            .execute(json!({"name": "Ada"}), &EnvMap::new())
            .await
            .unwrap();
        assert_eq!(out["message"], "Hello, Ada!");
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let tool = EchoTool;
        let params = json!({"k": [1, 2, 3]});
        let out = tool.execute(params.clone(), &EnvMap::new()).await.unwrap();
        assert_eq!(out["echo"], params);
    }

    #[test]
    fn test_builtin_packages_present() {
        let packages = builtin_packages();
        assert!(packages.iter().any(|(name, _)| name == "@toolhost/hello"));
        let hello = &packages
            .iter()
            .find(|(name, _)| name == "@toolhost/hello")
            .unwrap()
            .1;
        assert!(hello.get("helloWorldTool").is_some());
    }
}
