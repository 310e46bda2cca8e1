//! Tool health classification and tracking.
//!
//! A failed execution does not automatically mean a broken tool: a tool that
//! rejects missing configuration or bad input is doing its job. The classifier
//! separates those outcomes so the registry's health signal stays meaningful.
//!
//! Classification trusts a structured `ToolErrorKind` when the tool declares
//! one; otherwise it falls back to case-insensitive pattern sets over the
//! free-text error message. The pattern lists here are the single source of
//! truth for the broken-vs-misused distinction.
//!
//! Health records converge last-write-wins; health is advisory, not
//! authoritative business data, so no transactional guarantee is needed.

use chrono::{DateTime, Utc};
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::tools::ToolErrorKind;
use crate::types::ToolId;

// =============================================================================
// Health state
// =============================================================================

/// Tri-state health classification persisted per tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthState {
    Healthy,
    Broken,
    Unknown,
}

// =============================================================================
// Classifier
// =============================================================================

/// Error messages indicating missing caller-supplied configuration.
/// A tool failing this way is functioning correctly.
const ENV_CONFIG_PATTERNS: &[&str] = &[
    r"is required",
    r"api[ _-]?key.*not (provided|set|found|configured)",
    r"no api[ _-]?key",
    r"must be set",
    r"missing (api[ _-]?key|credential|token|secret)",
    r"environment variable",
    r"not configured",
];

/// Error messages indicating the tool correctly rejected bad input.
const INPUT_VALIDATION_PATTERNS: &[&str] = &[
    r"invalid (url|input|parameter|argument|value|format)",
    r"must be a (string|number|integer|boolean|array|object|valid)",
    r"validation (failed|error)",
    r"expected (a |an )?(string|number|integer|boolean|array|object)",
    r"missing required (parameter|field|argument)",
    r"cannot be empty",
    r"out of range",
];

/// Decides whether a failure marks a tool as broken.
#[derive(Debug)]
pub struct HealthClassifier {
    env_config: RegexSet,
    input_validation: RegexSet,
}

impl HealthClassifier {
    #[allow(clippy::expect_used)] // both pattern lists are static and compile
    pub fn new() -> Self {
        Self {
            env_config: case_insensitive_set(ENV_CONFIG_PATTERNS)
                .expect("env-config patterns compile"),
            input_validation: case_insensitive_set(INPUT_VALIDATION_PATTERNS)
                .expect("input-validation patterns compile"),
        }
    }

    /// Classify one execution outcome.
    ///
    /// A declared `kind` short-circuits the pattern matching; `Config` and
    /// `Validation` failures are healthy, `Internal` is broken.
    pub fn classify(
        &self,
        success: bool,
        kind: Option<ToolErrorKind>,
        error_message: Option<&str>,
    ) -> HealthState {
        if success {
            return HealthState::Healthy;
        }

        match kind {
            Some(ToolErrorKind::Config) | Some(ToolErrorKind::Validation) => {
                return HealthState::Healthy
            }
            Some(ToolErrorKind::Internal) => return HealthState::Broken,
            None => {}
        }

        let message = match error_message {
            Some(m) => m,
            None => return HealthState::Broken,
        };

        if self.env_config.is_match(message) || self.input_validation.is_match(message) {
            HealthState::Healthy
        } else {
            HealthState::Broken
        }
    }
}

impl Default for HealthClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn case_insensitive_set(patterns: &[&str]) -> Result<RegexSet, regex::Error> {
    let prefixed: Vec<String> = patterns.iter().map(|p| format!("(?i){}", p)).collect();
    RegexSet::new(prefixed)
}

// =============================================================================
// Health records
// =============================================================================

/// Per-tool health record. Import health and execution health are tracked
/// separately; one-way-overwrite, no history retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub tool_id: ToolId,
    pub import_health: HealthState,
    pub execution_health: HealthState,
    /// Verbatim message of the last broken-classified error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub last_checked_at: DateTime<Utc>,
}

impl HealthRecord {
    fn unknown(tool_id: ToolId) -> Self {
        Self {
            tool_id,
            import_health: HealthState::Unknown,
            execution_health: HealthState::Unknown,
            last_error: None,
            last_checked_at: Utc::now(),
        }
    }
}

/// In-memory health store, keyed by `ToolId`. The durable marketplace store
/// sits behind the same report seam; this is the engine-local view.
#[derive(Debug)]
pub struct HealthMonitor {
    classifier: HealthClassifier,
    records: RwLock<HashMap<ToolId, HealthRecord>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            classifier: HealthClassifier::new(),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn classifier(&self) -> &HealthClassifier {
        &self.classifier
    }

    /// Record a resolution (import) outcome. `last_checked_at` is refreshed
    /// regardless of outcome.
    pub async fn record_import(&self, tool_id: &ToolId, success: bool, error: Option<&str>) {
        let state = if success {
            HealthState::Healthy
        } else {
            HealthState::Broken
        };
        let mut records = self.records.write().await;
        let record = records
            .entry(tool_id.clone())
            .or_insert_with(|| HealthRecord::unknown(tool_id.clone()));
        record.import_health = state;
        if state == HealthState::Broken {
            record.last_error = error.map(|e| e.to_string());
        }
        record.last_checked_at = Utc::now();
    }

    /// Classify and record an execution outcome, returning the classification.
    pub async fn record_execution(
        &self,
        tool_id: &ToolId,
        success: bool,
        kind: Option<ToolErrorKind>,
        error: Option<&str>,
    ) -> HealthState {
        let state = self.classifier.classify(success, kind, error);

        let mut records = self.records.write().await;
        let record = records
            .entry(tool_id.clone())
            .or_insert_with(|| HealthRecord::unknown(tool_id.clone()));
        record.execution_health = state;
        record.last_error = match state {
            // Retain the breaking message verbatim; clear it once healthy.
            HealthState::Broken => error.map(|e| e.to_string()),
            _ => None,
        };
        record.last_checked_at = Utc::now();
        state
    }

    pub async fn get(&self, tool_id: &ToolId) -> Option<HealthRecord> {
        self.records.read().await.get(tool_id).cloned()
    }

    /// Number of tracked tools.
    pub async fn tool_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> HealthClassifier {
        HealthClassifier::new()
    }

    #[test]
    fn test_success_is_healthy() {
        assert_eq!(
            classifier().classify(true, None, None),
            HealthState::Healthy
        );
    }

    #[test]
    fn test_env_config_pattern_is_healthy() {
        assert_eq!(
            classifier().classify(false, None, Some("OPENAI_API_KEY is required")),
            HealthState::Healthy
        );
        assert_eq!(
            classifier().classify(false, None, Some("API key was not provided")),
            HealthState::Healthy
        );
        assert_eq!(
            classifier().classify(false, None, Some("TAVILY_TOKEN must be set")),
            HealthState::Healthy
        );
    }

    #[test]
    fn test_input_validation_pattern_is_healthy() {
        assert_eq!(
            classifier().classify(
                false,
                None,
                Some("Invalid URL: must be a valid http or https URL")
            ),
            HealthState::Healthy
        );
        assert_eq!(
            classifier().classify(false, None, Some("query must be a string")),
            HealthState::Healthy
        );
        assert_eq!(
            classifier().classify(false, None, Some("Validation failed: 2 errors")),
            HealthState::Healthy
        );
    }

    #[test]
    fn test_genuine_failure_is_broken() {
        assert_eq!(
            classifier().classify(false, None, Some("Cannot read properties of undefined")),
            HealthState::Broken
        );
        assert_eq!(classifier().classify(false, None, None), HealthState::Broken);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(
            classifier().classify(false, None, Some("INVALID URL")),
            HealthState::Healthy
        );
    }

    #[test]
    fn test_structured_kind_overrides_patterns() {
        // Message looks broken, but the tool declared a config failure
        assert_eq!(
            classifier().classify(false, Some(ToolErrorKind::Config), Some("boom")),
            HealthState::Healthy
        );
        // Message looks like config, but the tool declared internal
        assert_eq!(
            classifier().classify(
                false,
                Some(ToolErrorKind::Internal),
                Some("OPENAI_API_KEY is required")
            ),
            HealthState::Broken
        );
    }

    #[tokio::test]
    async fn test_record_execution_retains_broken_message_verbatim() {
        let monitor = HealthMonitor::new();
        let id = ToolId::new("@a/b", "x");

        let state = monitor
            .record_execution(&id, false, None, Some("Cannot read properties of undefined"))
            .await;
        assert_eq!(state, HealthState::Broken);

        let record = monitor.get(&id).await.unwrap();
        assert_eq!(record.execution_health, HealthState::Broken);
        assert_eq!(
            record.last_error.as_deref(),
            Some("Cannot read properties of undefined")
        );
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let monitor = HealthMonitor::new();
        let id = ToolId::new("@a/b", "x");

        monitor
            .record_execution(&id, false, None, Some("some hard crash"))
            .await;
        monitor.record_execution(&id, true, None, None).await;

        let record = monitor.get(&id).await.unwrap();
        assert_eq!(record.execution_health, HealthState::Healthy);
        assert!(record.last_error.is_none());
    }

    #[tokio::test]
    async fn test_import_and_execution_tracked_separately() {
        let monitor = HealthMonitor::new();
        let id = ToolId::new("@a/b", "x");

        monitor.record_import(&id, true, None).await;
        monitor
            .record_execution(&id, false, None, Some("null pointer"))
            .await;

        let record = monitor.get(&id).await.unwrap();
        assert_eq!(record.import_health, HealthState::Healthy);
        assert_eq!(record.execution_health, HealthState::Broken);
    }

    #[test]
    fn test_health_state_wire_format() {
        assert_eq!(
            serde_json::to_string(&HealthState::Healthy).unwrap(),
            r#""HEALTHY""#
        );
        assert_eq!(
            serde_json::to_string(&HealthState::Broken).unwrap(),
            r#""BROKEN""#
        );
    }
}
