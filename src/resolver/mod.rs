//! Module resolver — turns a package reference into a runnable export.
//!
//! Cache hit returns with no I/O. On a miss, the loader fetches the package's
//! export map, the requested export is selected (falling back to `default`,
//! then a sole export), shape-checked, and cached. Concurrent misses for the
//! same key are collapsed into a single load via per-key in-flight guards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::tools::{ModuleExports, RawExport};
use crate::types::{Error, Result};
use crate::validation::validate_non_empty;

mod cache;
mod loader;

pub use cache::{CacheStats, CachedEntry, ModuleCache};
pub use loader::{CompositeLoader, HttpModuleLoader, ModuleLoader, StaticModuleLoader};

// =============================================================================
// Tool reference
// =============================================================================

fn default_version() -> String {
    "latest".to_string()
}

/// Immutable reference to a published tool export, constructed per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReference {
    pub package_name: String,
    pub export_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Explicit manifest URL; when absent the registry template is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_url: Option<String>,
}

impl ToolReference {
    pub fn new(package_name: impl Into<String>, export_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            export_name: export_name.into(),
            version: default_version(),
            import_url: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Cache key: `packageName::exportName`.
    pub fn cache_key(&self) -> String {
        format!("{}::{}", self.package_name, self.export_name)
    }

    /// Manifest URL: explicit `importUrl` or the registry template.
    pub fn import_url(&self, registry_base: &str) -> String {
        match &self.import_url {
            Some(url) => url.clone(),
            None => format!(
                "{}/{}@{}/manifest.json",
                registry_base.trim_end_matches('/'),
                self.package_name,
                self.version
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_non_empty(&self.package_name, "packageName")?;
        validate_non_empty(&self.export_name, "exportName")?;
        Ok(())
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Outcome of a resolution: the export plus cache provenance.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub key: String,
    pub export: RawExport,
    pub cached_at: chrono::DateTime<chrono::Utc>,
    pub from_cache: bool,
}

/// Resolver owning the module cache and the loader boundary.
pub struct Resolver {
    loader: Arc<dyn ModuleLoader>,
    cache: ModuleCache,
    /// Per-key guards collapsing concurrent cache misses into one load.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Resolver")
    }
}

impl Resolver {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            cache: ModuleCache::new(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Resolve a reference to a runnable export, from cache or via the loader.
    pub async fn resolve(&self, reference: &ToolReference) -> Result<Resolved> {
        reference.validate()?;
        let key = reference.cache_key();

        if let Some(entry) = self.cache.get(&key).await {
            tracing::debug!(%key, "resolver cache hit");
            return Ok(Resolved {
                key,
                export: entry.export,
                cached_at: entry.cached_at,
                from_cache: true,
            });
        }

        // Single-flight: one loader call per key, concurrent callers wait.
        let guard = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _held = guard.lock().await;

        // A concurrent caller may have populated the cache while we waited.
        if let Some(entry) = self.cache.get(&key).await {
            self.inflight.lock().await.remove(&key);
            return Ok(Resolved {
                key,
                export: entry.export,
                cached_at: entry.cached_at,
                from_cache: true,
            });
        }

        let result = self.load_and_select(reference, &key).await;
        self.inflight.lock().await.remove(&key);
        result
    }

    async fn load_and_select(&self, reference: &ToolReference, key: &str) -> Result<Resolved> {
        let exports = self.loader.load(reference).await?;
        let export = select_export(&exports, &reference.export_name)?;

        let entry = self.cache.put(key.to_string(), export).await;
        tracing::info!(%key, version = %reference.version, "resolved and cached module export");
        Ok(Resolved {
            key: key.to_string(),
            export: entry.export,
            cached_at: entry.cached_at,
            from_cache: false,
        })
    }
}

/// Select `exports[name]`, falling back to `default`, then a sole export.
/// Null entries count as absent; shapeless entries fail resolution.
fn select_export(exports: &ModuleExports, export_name: &str) -> Result<RawExport> {
    let selected = exports
        .get(export_name)
        .or_else(|| exports.get("default"))
        .or_else(|| exports.sole());

    match selected {
        None | Some(RawExport::Opaque(serde_json::Value::Null)) => Err(Error::ExportNotFound {
            export: export_name.to_string(),
            available: exports.names(),
        }),
        Some(RawExport::Opaque(_)) => Err(Error::invalid_tool_shape(format!(
            "export '{}' declares neither an execute capability nor a factory shape",
            export_name
        ))),
        Some(export) => Ok(export.clone()),
    }
}
