//! Configuration for termline hosts.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.termline/config.toml`
//! - Policy defaults for ANSI output and render width
//! - Timing knobs for the capability probe and escape disambiguation
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.termline/config.toml`:
//!
//! ```toml
//! # ANSI policy: "always", "never", or "auto"
//! ansi_mode = "auto"
//!
//! # Render width when no session reports a size
//! fallback_width = 80
//!
//! # Milliseconds to wait for capability-probe responses
//! probe_timeout_ms = 500
//!
//! # Milliseconds to wait after ESC before treating it as the Escape key
//! escape_timeout_ms = 50
//!
//! [history]
//! limit = 1000
//! persist = true
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::session::AnsiMode;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// ANSI output policy
    pub ansi_mode: AnsiMode,
    /// Render width when no session reports a size
    pub fallback_width: u16,
    /// Capability probe response timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Escape disambiguation timeout in milliseconds
    pub escape_timeout_ms: u64,
    /// How many history entries the editor fetches for Up/Down navigation
    pub history_window: usize,
    /// History settings
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ansi_mode: AnsiMode::Auto,
            fallback_width: 80,
            probe_timeout_ms: 500,
            escape_timeout_ms: 50,
            history_window: 100,
            history: HistoryConfig::default(),
        }
    }
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum entries kept
    pub limit: usize,
    /// Whether to persist history to `~/.termline/history`
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: 1000,
            persist: true,
        }
    }
}

impl Config {
    /// Load configuration from `~/.termline/config.toml`, falling back to
    /// defaults when the file is missing or malformed.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn escape_timeout(&self) -> Duration {
        Duration::from_millis(self.escape_timeout_ms)
    }

    fn config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".termline").join("config.toml"))
    }
}

/// Get home directory
pub(crate) fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
