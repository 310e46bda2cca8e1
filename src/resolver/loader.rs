//! Module loaders — the vetted boundary between the registry and the
//! capability layer.
//!
//! A loader turns a `ToolReference` into a `ModuleExports` map of tagged
//! `RawExport`s. Remote module text is never evaluated: the HTTP loader reads
//! a declarative JSON manifest and adapts each entry to `RemoteTool` /
//! `RemoteFactory`. The static loader holds in-process exports (builtins,
//! tests).
//!
//! Manifest format:
//! ```json
//! {
//!   "exports": {
//!     "helloWorldTool": {
//!       "description": "...",
//!       "inputSchema": { "type": "object" },
//!       "shape": "handle",
//!       "invoke": { "url": "https://..." },
//!       "configKeys": ["OPENAI_API_KEY"]
//!     }
//!   }
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::resolver::ToolReference;
use crate::tools::{builtin_packages, ModuleExports, RawExport, RemoteFactory, RemoteTool, ToolDescriptor};
use crate::types::{Error, Result};

/// Source of module exports for the resolver's cache-miss path.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load the export map for a package reference.
    ///
    /// Returns `Error::NotFound` when this loader does not know the package
    /// (a composite falls through to the next loader), `Error::FetchFailed`
    /// on network/non-2xx failures.
    async fn load(&self, reference: &ToolReference) -> Result<ModuleExports>;
}

// =============================================================================
// Static loader
// =============================================================================

/// In-memory loader for builtin packages and tests.
#[derive(Debug, Default)]
pub struct StaticModuleLoader {
    packages: HashMap<String, ModuleExports>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader pre-populated with the `@toolhost/*` builtins.
    pub fn with_builtins() -> Self {
        let mut loader = Self::new();
        for (name, exports) in builtin_packages() {
            loader.register(name, exports);
        }
        loader
    }

    pub fn register(&mut self, package_name: impl Into<String>, exports: ModuleExports) {
        self.packages.insert(package_name.into(), exports);
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn load(&self, reference: &ToolReference) -> Result<ModuleExports> {
        self.packages
            .get(&reference.package_name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("package {}", reference.package_name)))
    }
}

// =============================================================================
// HTTP registry loader
// =============================================================================

/// Loader that fetches package manifests from the HTTP registry.
#[derive(Debug, Clone)]
pub struct HttpModuleLoader {
    client: reqwest::Client,
    registry_url: String,
}

impl HttpModuleLoader {
    pub fn new(client: reqwest::Client, registry_url: impl Into<String>) -> Self {
        Self {
            client,
            registry_url: registry_url.into(),
        }
    }
}

#[async_trait]
impl ModuleLoader for HttpModuleLoader {
    async fn load(&self, reference: &ToolReference) -> Result<ModuleExports> {
        let url = reference.import_url(&self.registry_url);
        tracing::debug!(package = %reference.package_name, %url, "fetching module manifest");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::fetch_failed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch_failed(format!(
                "{} returned {}",
                url, status
            )));
        }

        let manifest: ManifestDoc = response
            .json()
            .await
            .map_err(|e| Error::fetch_failed(format!("invalid manifest at {}: {}", url, e)))?;

        let mut exports = ModuleExports::new();
        for (name, entry) in manifest.exports {
            exports.insert(name.clone(), adapt_manifest_entry(&name, entry, &self.client));
        }
        Ok(exports)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestDoc {
    #[serde(default)]
    exports: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestExport {
    description: String,
    #[serde(default)]
    input_schema: Value,
    #[serde(default)]
    shape: ManifestShape,
    invoke: InvokeSpec,
    #[serde(default)]
    config_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ManifestShape {
    #[default]
    Handle,
    Factory,
}

#[derive(Debug, Deserialize)]
struct InvokeSpec {
    url: String,
}

/// Adapt one manifest entry to a tagged export. Entries missing the minimal
/// tool shape (description + invocation endpoint) become `Opaque` and fail
/// resolution with `InvalidToolShape`.
fn adapt_manifest_entry(name: &str, raw: Value, client: &reqwest::Client) -> RawExport {
    let parsed: ManifestExport = match serde_json::from_value(raw.clone()) {
        Ok(p) => p,
        Err(_) => return RawExport::Opaque(raw),
    };

    let descriptor = ToolDescriptor {
        export_name: name.to_string(),
        description: parsed.description,
        input_schema: parsed.input_schema,
    };

    match parsed.shape {
        ManifestShape::Handle => RawExport::Handle(Arc::new(RemoteTool::new(
            descriptor,
            parsed.invoke.url,
            client.clone(),
        ))),
        ManifestShape::Factory => RawExport::Factory(Arc::new(RemoteFactory::new(
            descriptor,
            parsed.invoke.url,
            client.clone(),
            parsed.config_keys,
        ))),
    }
}

// =============================================================================
// Composite loader
// =============================================================================

/// Tries loaders in order; `NotFound` falls through, any other error is final.
pub struct CompositeLoader {
    loaders: Vec<Arc<dyn ModuleLoader>>,
}

impl CompositeLoader {
    pub fn new(loaders: Vec<Arc<dyn ModuleLoader>>) -> Self {
        Self { loaders }
    }
}

impl std::fmt::Debug for CompositeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompositeLoader({} loaders)", self.loaders.len())
    }
}

#[async_trait]
impl ModuleLoader for CompositeLoader {
    async fn load(&self, reference: &ToolReference) -> Result<ModuleExports> {
        for loader in &self.loaders {
            match loader.load(reference).await {
                Ok(exports) => return Ok(exports),
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::not_found(format!(
            "package {}",
            reference.package_name
        )))
    }
}
