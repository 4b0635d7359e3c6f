//! Observability setup for Boxo binaries.
//!
//! This crate provides:
//! - `LogLevel` / `LogFormat` - Configurable verbosity and output shape
//! - `LogConfig` - The `[logging]` config section
//! - `init` - Installs the global `tracing` subscriber

mod logging;

pub use logging::*;
