//! Bounded executor — runs a normalized handle under a wall-clock budget.
//!
//! The timeout races the handle's `execute` against a timer. On timer win the
//! future is dropped and a `Failure` is returned; cancellation is best-effort
//! only — an in-flight remote invocation may keep running on its endpoint.
//! True preemption would require an isolated runner process that can be
//! killed, which this in-process executor does not provide.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::tools::{EnvMap, Tool, ToolErrorKind};

mod normalize;

pub use normalize::normalize;

/// Outcome of one execution attempt. `duration_ms` is the executor's own
/// wall-clock measurement and is populated on every path.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Success {
        output: Value,
        duration_ms: u64,
    },
    Failure {
        message: String,
        /// Structured category when the tool declared one.
        kind: Option<ToolErrorKind>,
        duration_ms: u64,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            ExecutionResult::Success { duration_ms, .. } => *duration_ms,
            ExecutionResult::Failure { duration_ms, .. } => *duration_ms,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::Failure { message, .. } => Some(message),
        }
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::Failure { kind, .. } => *kind,
        }
    }

    /// Failure with a near-zero duration, for requests rejected before the
    /// handle ever ran (e.g. parameter validation).
    pub fn rejected(message: impl Into<String>, kind: ToolErrorKind, elapsed: Duration) -> Self {
        ExecutionResult::Failure {
            message: message.into(),
            kind: Some(kind),
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Executes handles against caller params under a timeout.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    default_timeout: Duration,
}

impl BoundedExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `tool.execute(params, env)` under the given (or default) timeout.
    ///
    /// Never returns an error: tool failures and timeouts are captured as
    /// `ExecutionResult::Failure`.
    pub async fn run(
        &self,
        tool: &Arc<dyn Tool>,
        params: Value,
        env: &EnvMap,
        timeout_override: Option<Duration>,
    ) -> ExecutionResult {
        let limit = timeout_override.unwrap_or(self.default_timeout);
        let started = Instant::now();

        match tokio::time::timeout(limit, tool.execute(params, env)).await {
            Ok(Ok(output)) => ExecutionResult::Success {
                output,
                duration_ms: started.elapsed().as_millis() as u64,
            },
            Ok(Err(tool_err)) => {
                tracing::debug!(error = %tool_err.message, "tool execution failed");
                ExecutionResult::Failure {
                    message: tool_err.message,
                    kind: tool_err.kind,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
            Err(_elapsed) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "tool execution timed out");
                ExecutionResult::Failure {
                    message: format!("timeout after {}ms", limit.as_millis()),
                    kind: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolDescriptor, ToolError};
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Debug)]
    struct InstantTool;

    #[async_trait]
    impl Tool for InstantTool {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor {
                export_name: "instant".to_string(),
                description: "instant".to_string(),
                input_schema: Value::Null,
            }
        }

        async fn execute(
            &self,
            params: Value,
            _env: &EnvMap,
        ) -> std::result::Result<Value, ToolError> {
            Ok(json!({"got": params}))
        }
    }

    #[derive(Debug)]
    struct NeverTool;

    #[async_trait]
    impl Tool for NeverTool {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor {
                export_name: "never".to_string(),
                description: "never resolves".to_string(),
                input_schema: Value::Null,
            }
        }

        async fn execute(
            &self,
            _params: Value,
            _env: &EnvMap,
        ) -> std::result::Result<Value, ToolError> {
            std::future::pending().await
        }
    }

    #[derive(Debug)]
    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor {
                export_name: "failing".to_string(),
                description: "always fails".to_string(),
                input_schema: Value::Null,
            }
        }

        async fn execute(
            &self,
            _params: Value,
            _env: &EnvMap,
        ) -> std::result::Result<Value, ToolError> {
            Err(ToolError::untagged("Cannot read properties of undefined"))
        }
    }

    #[tokio::test]
    async fn test_success_wraps_output_with_duration() {
        let executor = BoundedExecutor::new(Duration::from_secs(5));
        let tool: Arc<dyn Tool> = Arc::new(InstantTool);

        let result = executor
            .run(&tool, json!({"x": 1}), &EnvMap::new(), None)
            .await;
        assert!(result.is_success());
        match result {
            ExecutionResult::Success { output, .. } => assert_eq!(output["got"]["x"], 1),
            ExecutionResult::Failure { .. } => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn test_timeout_returns_failure_near_budget() {
        let executor = BoundedExecutor::new(Duration::from_secs(300));
        let tool: Arc<dyn Tool> = Arc::new(NeverTool);

        let result = executor
            .run(
                &tool,
                json!({}),
                &EnvMap::new(),
                Some(Duration::from_millis(100)),
            )
            .await;

        assert!(!result.is_success());
        let message = result.error_message().unwrap();
        assert!(message.starts_with("timeout"), "got: {}", message);
        // Wall-clock elapsed tracks the configured budget within tolerance.
        assert!(
            (90..1000).contains(&result.duration_ms()),
            "duration {}ms not near 100ms budget",
            result.duration_ms()
        );
    }

    #[tokio::test]
    async fn test_tool_error_captured_not_thrown() {
        let executor = BoundedExecutor::new(Duration::from_secs(5));
        let tool: Arc<dyn Tool> = Arc::new(FailingTool);

        let result = executor.run(&tool, json!({}), &EnvMap::new(), None).await;
        assert_eq!(
            result.error_message(),
            Some("Cannot read properties of undefined")
        );
        assert_eq!(result.error_kind(), None);
    }

    #[tokio::test]
    async fn test_duration_populated_on_failure() {
        let executor = BoundedExecutor::new(Duration::from_secs(5));
        let tool: Arc<dyn Tool> = Arc::new(FailingTool);

        let result = executor.run(&tool, json!({}), &EnvMap::new(), None).await;
        // Wall-clock measured by the executor, zero is fine for instant failure
        assert!(result.duration_ms() < 1000);
    }
}
