//! Engine facade — admission, resolution, normalization, bounded execution,
//! and health recording behind one seam.
//!
//! Per-request flow: rate gate (checked by the transport before calling in)
//! → resolver (cache hit or fetch+cache) → factory normalizer → parameter
//! validation → bounded executor → health classifier. Resolution and
//! normalization errors are fatal for the request; execution failures are
//! captured as `ExecutionResult::Failure` and never escape as errors.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::executor::{normalize, BoundedExecutor, ExecutionResult};
use crate::health::{HealthMonitor, HealthRecord};
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::resolver::{
    CacheStats, CompositeLoader, HttpModuleLoader, ModuleLoader, Resolver, StaticModuleLoader,
    ToolReference,
};
use crate::tools::{EnvMap, ToolDescriptor, ToolErrorKind};
use crate::types::{Config, Error, RequestId, Result, ToolId};

/// One execution request; created fresh per call, never persisted.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub reference: ToolReference,
    pub params: Value,
    pub env: EnvMap,
    /// Per-request override of the configured execution timeout.
    pub timeout: Option<Duration>,
}

/// Liveness payload for `GET /health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub cache_size: usize,
    pub tracked_tools: usize,
    pub execution_timeout_ms: u64,
    pub memory_limit_mb: u64,
}

/// The tool resolution and execution engine.
pub struct Engine {
    config: Config,
    resolver: Resolver,
    executor: BoundedExecutor,
    health: HealthMonitor,
    rate_limiter: RateLimiter,
    started_at: Instant,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Engine")
    }
}

impl Engine {
    /// Build an engine around an explicit loader (tests inject a static one).
    pub fn new(config: Config, loader: Arc<dyn ModuleLoader>) -> Self {
        let executor = BoundedExecutor::new(config.engine.execution_timeout);
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());
        Self {
            resolver: Resolver::new(loader),
            executor,
            health: HealthMonitor::new(),
            rate_limiter,
            started_at: Instant::now(),
            config,
        }
    }

    /// Production wiring: builtins first, then the HTTP registry.
    pub fn with_default_loaders(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.engine.fetch_timeout)
            .build()
            .map_err(|e| Error::internal(format!("http client: {}", e)))?;

        let loader = CompositeLoader::new(vec![
            Arc::new(StaticModuleLoader::with_builtins()),
            Arc::new(HttpModuleLoader::new(client, config.engine.registry_url.clone())),
        ]);
        Ok(Self::new(config, Arc::new(loader)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Admission gate. The transport evaluates this before anything else.
    pub fn check_rate(&self, identity: &str) -> RateDecision {
        self.rate_limiter.check(identity)
    }

    /// Resolve, normalize, validate, execute, and record health for one call.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        let started = Instant::now();
        let request_id = RequestId::new();
        let tool_id = ToolId::new(
            &request.reference.package_name,
            &request.reference.export_name,
        );
        tracing::info!(
            request_id = %request_id,
            tool = %tool_id,
            version = %request.reference.version,
            "executing tool"
        );

        let resolved = match self.resolver.resolve(&request.reference).await {
            Ok(resolved) => {
                self.health.record_import(&tool_id, true, None).await;
                resolved
            }
            Err(e) => {
                self.health
                    .record_import(&tool_id, false, Some(&e.to_string()))
                    .await;
                return Err(e);
            }
        };

        let tool = match normalize(&resolved.export, &request.env) {
            Ok(tool) => tool,
            Err(e) => {
                self.health
                    .record_execution(&tool_id, false, None, Some(&e.to_string()))
                    .await;
                return Err(e);
            }
        };

        // Reject params the export's declared schema rules out. The tool is
        // doing its job here, so the failure classifies healthy.
        if let Some(message) = schema_violations(&tool.describe().input_schema, &request.params) {
            let result =
                ExecutionResult::rejected(message, ToolErrorKind::Validation, started.elapsed());
            self.health
                .record_execution(
                    &tool_id,
                    false,
                    result.error_kind(),
                    result.error_message(),
                )
                .await;
            return Ok(result);
        }

        let result = self
            .executor
            .run(&tool, request.params, &request.env, request.timeout)
            .await;

        self.health
            .record_execution(
                &tool_id,
                result.is_success(),
                result.error_kind(),
                result.error_message(),
            )
            .await;

        tracing::info!(
            request_id = %request_id,
            tool = %tool_id,
            success = result.is_success(),
            duration_ms = result.duration_ms(),
            from_cache = resolved.from_cache,
            "execution finished"
        );
        Ok(result)
    }

    /// Resolve a reference and return its descriptor without executing.
    pub async fn describe(&self, reference: &ToolReference) -> Result<ToolDescriptor> {
        let resolved = self.resolver.resolve(reference).await?;
        resolved.export.describe().ok_or_else(|| {
            Error::invalid_tool_shape(format!(
                "export '{}' has no descriptor",
                reference.export_name
            ))
        })
    }

    /// Collaborator seam: classify and upsert a reported outcome.
    pub async fn report_health(
        &self,
        package_name: &str,
        export_name: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<HealthRecord> {
        let tool_id = ToolId::new(package_name, export_name);
        self.health
            .record_execution(&tool_id, success, None, error)
            .await;
        self.health
            .get(&tool_id)
            .await
            .ok_or_else(|| Error::internal("health record missing after upsert"))
    }

    pub async fn tool_health(&self, package_name: &str, export_name: &str) -> Option<HealthRecord> {
        self.health.get(&ToolId::new(package_name, export_name)).await
    }

    pub async fn cache_clear(&self) -> usize {
        let cleared = self.resolver.cache().clear().await;
        tracing::info!(cleared, "module cache cleared");
        cleared
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats().await
    }

    pub async fn runtime_info(&self) -> RuntimeInfo {
        RuntimeInfo {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: self.started_at.elapsed().as_secs(),
            cache_size: self.resolver.cache().stats().await.size,
            tracked_tools: self.health.tool_count().await,
            execution_timeout_ms: self.config.engine.execution_timeout.as_millis() as u64,
            memory_limit_mb: self.config.engine.memory_limit_mb,
        }
    }
}

/// Validate params against a declared JSON Schema. Returns a joined message
/// when violations exist; schemas that are absent or unparseable validate
/// nothing.
fn schema_violations(schema: &Value, params: &Value) -> Option<String> {
    if !schema.is_object() {
        return None;
    }
    let validator = jsonschema::validator_for(schema).ok()?;
    let violations: Vec<String> = validator.iter_errors(params).map(|e| e.to_string()).collect();
    if violations.is_empty() {
        None
    } else {
        Some(format!("validation failed: {}", violations.join("; ")))
    }
}
