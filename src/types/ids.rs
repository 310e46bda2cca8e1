//! Strongly-typed identifiers.
//!
//! `ToolId` is the engine's canonical cache/health key
//! (`packageName::exportName`); `RequestId` tags a single execution attempt
//! for log correlation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical identifier for a resolved tool: `packageName::exportName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolId(String);

impl ToolId {
    pub fn new(package_name: &str, export_name: &str) -> Self {
        Self(format!("{}::{}", package_name, export_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Package half of the key.
    pub fn package_name(&self) -> &str {
        self.0.split("::").next().unwrap_or(&self.0)
    }

    /// Export half of the key.
    pub fn export_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-execution request identifier (UUID v4), used in tracing spans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
