//! # Toolhost - Dynamic Tool Resolution & Execution Engine
//!
//! Rust implementation of the toolhost engine providing:
//! - On-demand resolution of tool modules from a registry, with caching
//! - Single-flight deduplication of concurrent fetches for the same module
//! - Factory normalization (zero-arg, env-map, and narrowed construction)
//! - Bounded execution with per-request timeouts and uniform failure capture
//! - Health classification distinguishing broken tools from caller mistakes
//! - Sliding-window rate limiting per caller identity
//! - HTTP service layer for external clients
//!
//! ## Architecture
//!
//! The `Engine` facade owns all moving parts; the HTTP layer is a thin
//! adapter over it:
//! ```text
//!                    ┌─────────────────────────────────┐
//!   HTTP requests →  │          Engine                 │
//!                    │  ┌─────────┐ ┌─────────┐        │
//!                    │  │Resolver │ │ Bounded │        │
//!                    │  │ + Cache │ │Executor │        │
//!                    │  └─────────┘ └─────────┘        │
//!                    │  ┌─────────┐ ┌─────────┐        │
//!                    │  │ Health  │ │RateLimit│        │
//!                    │  │ Monitor │ │   er    │        │
//!                    │  └─────────┘ └─────────┘        │
//!                    └─────────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod engine;
pub mod executor;
pub mod health;
pub mod http;
pub mod ratelimit;
pub mod resolver;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;
pub mod validation;

pub use engine::Engine;
pub use types::{Config, Error, Result};
