// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.
//
// Loaded from `<data_dir>/config.json` when present, then overridden by
// `PRESSGATE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PressgateError, Result};
use crate::types::DispatchMode;

/// Settings for reaching a remote print gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://print-host:3001`. Required in remote mode.
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    pub token: Option<String>,
}

/// Settings for this process's own HTTP gateway service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Bearer token callers must present. `None` disables auth.
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".into(),
            token: None,
        }
    }
}

/// Persistent engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: DispatchMode,
    /// Printer registry document.
    pub registry_path: PathBuf,
    /// Where renditions are written. Files are removed after submission.
    pub render_dir: PathBuf,
    /// How long to wait for the spooler to acknowledge a job.
    pub submit_timeout_secs: u64,
    /// Timeout for fetching URL sources and for gateway calls.
    pub http_timeout_secs: u64,
    /// Upper bound on a fetched source image.
    pub max_source_bytes: usize,
    /// Reconcile every reported device before serving.
    pub reconcile_on_start: bool,
    pub gateway: GatewayConfig,
    pub server: ServerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_data_dir(&default_data_dir())
    }
}

impl EngineConfig {
    /// Defaults rooted at `dir`.
    pub fn with_data_dir(dir: &Path) -> Self {
        Self {
            mode: DispatchMode::Local,
            registry_path: dir.join("printers.json"),
            render_dir: dir.join("renders"),
            submit_timeout_secs: 30,
            http_timeout_secs: 60,
            max_source_bytes: 25 * 1024 * 1024,
            reconcile_on_start: true,
            gateway: GatewayConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Load `config.json` from `dir` if it exists, otherwise defaults rooted
    /// at `dir`; then apply environment overrides and validate.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let invalid = |e: serde_json::Error| {
                PressgateError::InvalidConfig(format!("{}: {e}", path.display()))
            };
            // Fields missing from the file keep their defaults rooted at `dir`.
            let mut merged = serde_json::to_value(Self::with_data_dir(dir))?;
            merge_json(&mut merged, serde_json::from_str(&raw).map_err(invalid)?);
            let parsed: Self = serde_json::from_value(merged).map_err(invalid)?;
            info!(path = %path.display(), "configuration loaded");
            parsed
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Self::with_data_dir(dir)
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PRESSGATE_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(mode) = lookup("PRESSGATE_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(path) = lookup("PRESSGATE_REGISTRY_PATH") {
            self.registry_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("PRESSGATE_RENDER_DIR") {
            self.render_dir = PathBuf::from(path);
        }
        if let Some(secs) = lookup("PRESSGATE_SUBMIT_TIMEOUT_SECS") {
            self.submit_timeout_secs = parse_number("PRESSGATE_SUBMIT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("PRESSGATE_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_number("PRESSGATE_HTTP_TIMEOUT_SECS", &secs)?;
        }
        if let Some(url) = lookup("PRESSGATE_GATEWAY_URL") {
            self.gateway.base_url = Some(url);
        }
        if let Some(token) = lookup("PRESSGATE_GATEWAY_TOKEN") {
            self.gateway.token = Some(token);
        }
        if let Some(bind) = lookup("PRESSGATE_BIND") {
            self.server.bind = bind;
        }
        if let Some(token) = lookup("PRESSGATE_SERVER_TOKEN") {
            self.server.token = Some(token);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == DispatchMode::Remote && self.gateway.base_url.is_none() {
            return Err(PressgateError::InvalidConfig(
                "remote mode requires a gateway base URL (PRESSGATE_GATEWAY_URL)".into(),
            ));
        }
        if self.submit_timeout_secs == 0 {
            return Err(PressgateError::InvalidConfig(
                "submit timeout must be at least one second".into(),
            ));
        }
        Ok(())
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PressgateError::InvalidConfig(format!("{key} must be a number, got '{value}'")))
}

/// Return the application data directory.
///
/// Honours `PRESSGATE_DATA_DIR`, then the XDG data dir, then `~/.local/share`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PRESSGATE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local").join("share")
    } else {
        // Last resort
        std::env::temp_dir()
    };
    base.join("pressgate")
}
