//! HTTP surface for the engine.
//!
//! Routes: `POST /execute-tool`, `POST /load-and-describe`, `GET /health`,
//! `POST /cache/clear`, `GET /cache/stats`, `POST /report-health`,
//! `GET /tool-health`. The rate gate runs first in the execute path and
//! short-circuits with 429 before any resolution work. All failure bodies
//! share the `{success: false, error, executionTimeMs}` shape so callers can
//! tell slow failures from fast ones.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::engine::{Engine, ExecutionRequest};
use crate::executor::ExecutionResult;
use crate::resolver::ToolReference;
use crate::tools::EnvMap;
use crate::types::Error;

/// Build the engine router.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/execute-tool", post(execute_tool))
        .route("/load-and-describe", post(load_and_describe))
        .route("/health", get(health))
        .route("/cache/clear", post(cache_clear))
        .route("/cache/stats", get(cache_stats))
        .route("/report-health", post(report_health))
        .route("/tool-health", get(tool_health))
        .with_state(engine)
}

/// CORS layer from the configured origin allow-list; permissive when empty.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}

// =============================================================================
// Caller identity
// =============================================================================

/// Derive the caller identity from the forwarding header chain, falling back
/// to `"unknown"` when nothing is present.
fn client_identity(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip.trim().to_string();
    }
    if let Some(connecting) = header_str(headers, "cf-connecting-ip") {
        return connecting.trim().to_string();
    }
    "unknown".to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteToolBody {
    package_name: String,
    /// Export name; the execute surface historically calls this `name`.
    name: String,
    version: Option<String>,
    import_url: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    env: Option<EnvMap>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeBody {
    package_name: String,
    export_name: String,
    version: Option<String>,
    import_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportHealthBody {
    package_name: String,
    export_name: String,
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolHealthQuery {
    package_name: String,
    export_name: String,
}

fn to_reference(
    package_name: String,
    export_name: String,
    version: Option<String>,
    import_url: Option<String>,
) -> ToolReference {
    let mut reference = ToolReference::new(package_name, export_name);
    if let Some(version) = version {
        reference = reference.with_version(version);
    }
    reference.import_url = import_url;
    reference
}

// =============================================================================
// Handlers
// =============================================================================

async fn execute_tool(
    State(engine): State<Arc<Engine>>,
    headers: HeaderMap,
    Json(body): Json<ExecuteToolBody>,
) -> Response {
    // Admission gate first: no resolution or execution work on rejection.
    let identity = client_identity(&headers);
    let decision = engine.check_rate(&identity);
    if !decision.allowed {
        tracing::warn!(%identity, reset_at = %decision.reset_at, "rate limited");
        return error_response(
            Error::RateLimited {
                reset_at: decision.reset_at,
            },
            Duration::ZERO,
        );
    }

    let started = Instant::now();
    let request = ExecutionRequest {
        reference: to_reference(body.package_name, body.name, body.version, body.import_url),
        params: body.params.unwrap_or_else(|| json!({})),
        env: body.env.unwrap_or_default(),
        timeout: body.timeout_ms.map(Duration::from_millis),
    };

    match engine.execute(request).await {
        Ok(ExecutionResult::Success {
            output,
            duration_ms,
        }) => Json(json!({
            "success": true,
            "output": output,
            "executionTimeMs": duration_ms,
        }))
        .into_response(),
        Ok(ExecutionResult::Failure {
            message,
            duration_ms,
            ..
        }) => Json(json!({
            "success": false,
            "error": message,
            "executionTimeMs": duration_ms,
        }))
        .into_response(),
        Err(e) => error_response(e, started.elapsed()),
    }
}

async fn load_and_describe(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<DescribeBody>,
) -> Response {
    let started = Instant::now();
    let reference = to_reference(
        body.package_name,
        body.export_name,
        body.version,
        body.import_url,
    );

    match engine.describe(&reference).await {
        Ok(descriptor) => Json(json!({
            "success": true,
            "tool": descriptor,
        }))
        .into_response(),
        Err(e) => error_response(e, started.elapsed()),
    }
}

async fn health(State(engine): State<Arc<Engine>>) -> Response {
    Json(engine.runtime_info().await).into_response()
}

async fn cache_clear(State(engine): State<Arc<Engine>>) -> Response {
    let cleared = engine.cache_clear().await;
    Json(json!({ "cleared": cleared })).into_response()
}

async fn cache_stats(State(engine): State<Arc<Engine>>) -> Response {
    Json(engine.cache_stats().await).into_response()
}

async fn report_health(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<ReportHealthBody>,
) -> Response {
    match engine
        .report_health(
            &body.package_name,
            &body.export_name,
            body.success,
            body.error.as_deref(),
        )
        .await
    {
        Ok(record) => Json(json!({
            "success": true,
            "record": record,
        }))
        .into_response(),
        Err(e) => error_response(e, Duration::ZERO),
    }
}

async fn tool_health(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<ToolHealthQuery>,
) -> Response {
    match engine
        .tool_health(&query.package_name, &query.export_name)
        .await
    {
        Some(record) => Json(json!({
            "success": true,
            "record": record,
        }))
        .into_response(),
        None => error_response(
            Error::not_found(format!(
                "no health record for {}::{}",
                query.package_name, query.export_name
            )),
            Duration::ZERO,
        ),
    }
}

/// Uniform error body. Errors never escape as unhandled exceptions; every
/// failure carries a message and the elapsed time so slow and fast failures
/// are distinguishable.
fn error_response(error: Error, elapsed: Duration) -> Response {
    let status: StatusCode = error.status_code();
    let mut body = json!({
        "success": false,
        "error": error.to_string(),
        "code": error.code(),
        "executionTimeMs": elapsed.as_millis() as u64,
    });

    match &error {
        Error::ExportNotFound { available, .. } => {
            body["availableExports"] = json!(available);
        }
        Error::RateLimited { reset_at } => {
            body["resetAt"] = json!(reset_at.to_rfc3339());
        }
        _ => {}
    }

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_identity_prefers_forwarded_for() {
        let headers = headers_with(&[
            ("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
            ("x-real-ip", "192.0.2.1"),
        ]);
        assert_eq!(client_identity(&headers), "203.0.113.9");
    }

    #[test]
    fn test_identity_falls_back_through_chain() {
        let headers = headers_with(&[("x-real-ip", "192.0.2.1")]);
        assert_eq!(client_identity(&headers), "192.0.2.1");

        let headers = headers_with(&[("cf-connecting-ip", "198.51.100.7")]);
        assert_eq!(client_identity(&headers), "198.51.100.7");

        assert_eq!(client_identity(&HeaderMap::new()), "unknown");
    }

    async fn body_json(response: Response) -> Value {
        let bytes = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_includes_diagnostics() {
        let error = Error::ExportNotFound {
            export: "x".to_string(),
            available: vec!["a".to_string(), "b".to_string()],
        };
        let response = error_response(error, Duration::from_millis(12));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["code"], json!("EXPORT_NOT_FOUND"));
        assert_eq!(body["availableExports"], json!(["a", "b"]));
        assert_eq!(body["executionTimeMs"], json!(12));
    }

    #[tokio::test]
    async fn test_rate_limited_body_carries_reset() {
        let reset_at = chrono::Utc::now();
        let response = error_response(Error::RateLimited { reset_at }, Duration::ZERO);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(body["code"], json!("RATE_LIMITED"));
        assert_eq!(body["resetAt"], json!(reset_at.to_rfc3339()));
        assert_eq!(body["executionTimeMs"], json!(0));
    }
}
