//! Factory normalization — best-effort strategy chain turning a raw export
//! into an execute-capable handle.
//!
//! Ordered, first success wins:
//! 1. already a handle → as-is
//! 2. factory → zero-argument build
//! 3. factory + non-empty env → build with the full env map, then a narrowed
//!    `{apiKey}` built from any env key containing `API_KEY`
//! 4. nothing worked → `NotExecutable`
//!
//! This is a heuristic chain, not a guarantee: a factory whose config needs
//! don't fit any strategy fails here and the request is over.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::tools::{EnvMap, RawExport, Tool};
use crate::types::{Error, Result};

/// Normalize a resolved export into a runnable handle.
pub fn normalize(export: &RawExport, env: &EnvMap) -> Result<Arc<dyn Tool>> {
    let factory = match export {
        RawExport::Handle(tool) => return Ok(tool.clone()),
        RawExport::Factory(factory) => factory,
        RawExport::Opaque(_) => {
            return Err(Error::not_executable(
                "export has no execute capability or factory shape",
            ))
        }
    };

    // Zero-argument build comes before any env-based strategy.
    let zero_arg_err = match factory.build(None) {
        Ok(tool) => return Ok(tool),
        Err(e) => e,
    };

    if !env.is_empty() {
        let full_env = serde_json::to_value(env)
            .map_err(|e| Error::internal(format!("env serialization: {}", e)))?;
        if let Ok(tool) = factory.build(Some(&full_env)) {
            return Ok(tool);
        }

        if let Some(api_key) = narrowed_api_key(env) {
            if let Ok(tool) = factory.build(Some(&json!({ "apiKey": api_key }))) {
                return Ok(tool);
            }
        }
    }

    Err(Error::not_executable(format!(
        "factory could not be normalized: {}",
        zero_arg_err.message
    )))
}

/// First env value (by sorted key) whose key contains `API_KEY`.
fn narrowed_api_key(env: &EnvMap) -> Option<&str> {
    let mut keys: Vec<&String> = env.keys().filter(|k| k.contains("API_KEY")).collect();
    keys.sort();
    keys.first().map(|k| env[*k].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolDescriptor, ToolError, ToolFactory};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor {
                export_name: "noop".to_string(),
                description: "noop".to_string(),
                input_schema: Value::Null,
            }
        }

        async fn execute(
            &self,
            _params: Value,
            _env: &EnvMap,
        ) -> std::result::Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    /// Factory that records every build attempt and succeeds only on the
    /// configured strategy.
    struct ProbeFactory {
        attempts: Mutex<Vec<String>>,
        succeed_on: fn(Option<&Value>) -> bool,
    }

    impl ProbeFactory {
        fn new(succeed_on: fn(Option<&Value>) -> bool) -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
                succeed_on,
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl ToolFactory for ProbeFactory {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor {
                export_name: "probe".to_string(),
                description: "probe".to_string(),
                input_schema: Value::Null,
            }
        }

        fn build(&self, config: Option<&Value>) -> std::result::Result<Arc<dyn Tool>, ToolError> {
            let label = match config {
                None => "zero-arg".to_string(),
                Some(v) if v.get("apiKey").is_some() && v.as_object().is_some_and(|m| m.len() == 1) => {
                    "narrowed".to_string()
                }
                Some(_) => "full-env".to_string(),
            };
            self.attempts.lock().unwrap().push(label);
            if (self.succeed_on)(config) {
                Ok(Arc::new(NoopTool))
            } else {
                Err(ToolError::config("OPENAI_API_KEY is required"))
            }
        }
    }

    fn env_with_key() -> EnvMap {
        let mut env = EnvMap::new();
        env.insert("OPENAI_API_KEY".to_string(), "sk-test".to_string());
        env.insert("UNRELATED".to_string(), "x".to_string());
        env
    }

    #[test]
    fn test_handle_passes_through() {
        let export = RawExport::Handle(Arc::new(NoopTool));
        assert!(normalize(&export, &EnvMap::new()).is_ok());
    }

    #[test]
    fn test_zero_arg_attempted_before_env() {
        let factory = Arc::new(ProbeFactory::new(|c| c.is_none()));
        let export = RawExport::Factory(factory.clone());

        normalize(&export, &env_with_key()).unwrap();
        assert_eq!(factory.attempts(), vec!["zero-arg"]);
    }

    #[test]
    fn test_full_env_attempted_second() {
        let factory = Arc::new(ProbeFactory::new(|c| {
            c.is_some_and(|v| v.get("UNRELATED").is_some())
        }));
        let export = RawExport::Factory(factory.clone());

        normalize(&export, &env_with_key()).unwrap();
        assert_eq!(factory.attempts(), vec!["zero-arg", "full-env"]);
    }

    #[test]
    fn test_narrowed_api_key_last_resort() {
        let factory = Arc::new(ProbeFactory::new(|c| {
            c.is_some_and(|v| v.as_object().is_some_and(|m| m.len() == 1 && m.contains_key("apiKey")))
        }));
        let export = RawExport::Factory(factory.clone());

        let tool = normalize(&export, &env_with_key()).unwrap();
        assert_eq!(tool.describe().export_name, "noop");
        assert_eq!(factory.attempts(), vec!["zero-arg", "full-env", "narrowed"]);
    }

    #[test]
    fn test_all_strategies_fail_is_not_executable() {
        let factory = Arc::new(ProbeFactory::new(|_| false));
        let export = RawExport::Factory(factory);

        let err = normalize(&export, &env_with_key()).unwrap_err();
        assert!(matches!(err, Error::NotExecutable(_)));
    }

    #[test]
    fn test_empty_env_skips_config_strategies() {
        let factory = Arc::new(ProbeFactory::new(|_| false));
        let export = RawExport::Factory(factory.clone());

        assert!(normalize(&export, &EnvMap::new()).is_err());
        assert_eq!(factory.attempts(), vec!["zero-arg"]);
    }

    #[test]
    fn test_narrowed_key_selection_is_deterministic() {
        let mut env = EnvMap::new();
        env.insert("Z_API_KEY".to_string(), "z".to_string());
        env.insert("A_API_KEY".to_string(), "a".to_string());
        assert_eq!(narrowed_api_key(&env), Some("a"));
    }
}
