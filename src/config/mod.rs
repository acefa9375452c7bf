//! Sentinel Configuration Module
//!
//! Analysis thresholds, probe timeouts and control behaviour loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `SENTINEL_CONFIG` environment variable (path to TOML file)
//! 2. `sentinel.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(SentinelConfig::load());
//! let window = config::get().analysis.window_days;
//! ```
//!
//! Library components take their section by value at construction, so
//! nothing below the binary depends on the global being initialised.

mod sentinel_config;
pub mod defaults;
pub mod validation;

pub use sentinel_config::*;

use std::sync::OnceLock;

/// Global sentinel configuration, initialized once at startup.
static SENTINEL_CONFIG: OnceLock<SentinelConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: SentinelConfig) {
    if SENTINEL_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Falls back to built-in defaults when `init()` was never called.
pub fn get() -> &'static SentinelConfig {
    SENTINEL_CONFIG.get_or_init(SentinelConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    SENTINEL_CONFIG.get().is_some()
}
