//! Tool capability boundary — the only interface loaded code is allowed to have.
//!
//! Remote module text is never evaluated in-process. Everything the resolver
//! loads must already be adapted to the narrow `Tool`/`ToolFactory` contracts
//! defined here; the executor only ever sees `Arc<dyn Tool>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod builtin;
pub mod remote;

pub use builtin::builtin_packages;
pub use remote::{RemoteFactory, RemoteTool};

/// Request-scoped environment map handed to tools at execution time.
///
/// Never written into process globals — a tool sees only what its own
/// request supplied.
pub type EnvMap = HashMap<String, String>;

// =============================================================================
// Descriptor
// =============================================================================

/// Public metadata for a tool export: what `load-and-describe` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub export_name: String,
    pub description: String,
    /// JSON Schema for the params object. `null` when the export declares none.
    #[serde(default)]
    pub input_schema: Value,
}

// =============================================================================
// Tool errors
// =============================================================================

/// Structured error category a tool may declare at the source.
///
/// When present, the health classifier trusts this over message-pattern
/// matching; `Config` and `Validation` failures are not the tool's fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolErrorKind {
    Config,
    Validation,
    Internal,
}

/// Failure raised by a tool's own execute (or factory build).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolErrorKind>,
    pub message: String,
}

impl ToolError {
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: Some(ToolErrorKind::Config),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: Some(ToolErrorKind::Validation),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: Some(ToolErrorKind::Internal),
            message: message.into(),
        }
    }

    /// Error with no declared category; the classifier falls back to
    /// message-pattern matching.
    pub fn untagged(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolError {}

// =============================================================================
// Capability traits
// =============================================================================

/// A directly-callable tool handle.
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Public metadata: export name, description, input schema.
    fn describe(&self) -> ToolDescriptor;

    /// Run the tool against caller-supplied parameters.
    async fn execute(&self, params: Value, env: &EnvMap) -> Result<Value, ToolError>;
}

/// An export that must be invoked once (possibly with configuration) before
/// it yields an execute-capable handle.
pub trait ToolFactory: Send + Sync {
    /// Metadata is available without building — `load-and-describe` must not
    /// trigger factory side effects.
    fn describe(&self) -> ToolDescriptor;

    /// Produce a handle. `config` is `None` for the zero-argument strategy,
    /// or a JSON object (full env map or narrowed `{apiKey}`) otherwise.
    fn build(&self, config: Option<&Value>) -> Result<Arc<dyn Tool>, ToolError>;
}

// =============================================================================
// Raw exports
// =============================================================================

/// A loaded module export, tagged by declared shape.
///
/// The normalizer turns `Handle` and `Factory` into runnable handles;
/// `Opaque` fails resolution with `InvalidToolShape`.
#[derive(Clone)]
pub enum RawExport {
    /// Ready-to-run handle exposing `execute`.
    Handle(Arc<dyn Tool>),
    /// Factory that must be invoked to produce a handle.
    Factory(Arc<dyn ToolFactory>),
    /// Manifest entry that declares neither a handle nor a factory shape.
    Opaque(Value),
}

impl RawExport {
    /// Descriptor without building anything.
    pub fn describe(&self) -> Option<ToolDescriptor> {
        match self {
            RawExport::Handle(tool) => Some(tool.describe()),
            RawExport::Factory(factory) => Some(factory.describe()),
            RawExport::Opaque(_) => None,
        }
    }
}

impl fmt::Debug for RawExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawExport::Handle(tool) => {
                write!(f, "RawExport::Handle({})", tool.describe().export_name)
            }
            RawExport::Factory(factory) => {
                write!(f, "RawExport::Factory({})", factory.describe().export_name)
            }
            RawExport::Opaque(_) => write!(f, "RawExport::Opaque"),
        }
    }
}

/// Export map of a loaded module.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    exports: HashMap<String, RawExport>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, export: RawExport) {
        self.exports.insert(name.into(), export);
    }

    pub fn get(&self, name: &str) -> Option<&RawExport> {
        self.exports.get(name)
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Sorted export names, used for `ExportNotFound` diagnostics.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.exports.keys().cloned().collect();
        names.sort();
        names
    }

    /// The only export, if there is exactly one.
    pub fn sole(&self) -> Option<&RawExport> {
        if self.exports.len() == 1 {
            self.exports.values().next()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy;

    #[async_trait]
    impl Tool for Dummy {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor {
                export_name: "dummy".to_string(),
                description: "A dummy tool".to_string(),
                input_schema: Value::Null,
            }
        }

        async fn execute(&self, _params: Value, _env: &EnvMap) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_exports_names_sorted() {
        let mut exports = ModuleExports::new();
        exports.insert("zeta", RawExport::Handle(Arc::new(Dummy)));
        exports.insert("alpha", RawExport::Handle(Arc::new(Dummy)));
        assert_eq!(exports.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_sole_export() {
        let mut exports = ModuleExports::new();
        assert!(exports.sole().is_none());
        exports.insert("only", RawExport::Handle(Arc::new(Dummy)));
        assert!(exports.sole().is_some());
        exports.insert("second", RawExport::Opaque(Value::Null));
        assert!(exports.sole().is_none());
    }

    #[test]
    fn test_tool_error_kinds() {
        assert_eq!(ToolError::config("x").kind, Some(ToolErrorKind::Config));
        assert_eq!(
            ToolError::validation("x").kind,
            Some(ToolErrorKind::Validation)
        );
        assert_eq!(ToolError::untagged("x").kind, None);
    }
}
