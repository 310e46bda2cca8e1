//! Core types for the toolhost engine.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (ToolId, RequestId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for server, engine, and admission

mod config;
mod errors;
mod ids;

pub use config::{Config, EngineConfig, ObservabilityConfig, RateLimitSettings, ServerConfig};
pub use errors::{Error, Result};
pub use ids::{RequestId, ToolId};
