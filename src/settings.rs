//! Shell settings
//!
//! Loaded from `settings.toml` in the platform config directory. Missing
//! files or fields fall back to defaults.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::host::{ProcessConfig, SupervisorError};

/// Proxy binary shipped next to the shell
pub const DEFAULT_PROXY_BINARY: &str = "radicle-proxy";
/// Output lines kept for the exit report
pub const DEFAULT_LINE_LIMIT: usize = 500;
/// URL scheme the shell is registered for
pub const DEFAULT_PROTOCOL_SCHEME: &str = "radicle";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Proxy binary '{0}' not found")]
    ProxyNotFound(String),

    #[error(transparent)]
    InvalidProxy(#[from] SupervisorError),
}

/// Persistent shell settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub protocol_scheme: String,
    pub proxy: ProxySettings,
}

/// How the backing proxy is launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Explicit executable path, overrides lookup
    pub path: Option<PathBuf>,
    /// File name looked up next to the shell or on PATH
    pub binary_name: String,
    /// Arguments for packaged mode
    pub args: Vec<String>,
    /// Arguments for dev mode
    pub dev_args: Vec<String>,
    pub line_limit: usize,
    /// Look the proxy up on PATH and use `dev_args`
    pub dev_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol_scheme: DEFAULT_PROTOCOL_SCHEME.to_string(),
            proxy: ProxySettings::default(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            path: None,
            binary_name: DEFAULT_PROXY_BINARY.to_string(),
            args: Vec::new(),
            dev_args: Vec::new(),
            line_limit: DEFAULT_LINE_LIMIT,
            dev_mode: false,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("xyz", "radicle", "upstream-shell")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Load from the default location, falling back to defaults on error
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Using default settings");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolve which executable to start and with which arguments
    pub fn resolve_launch(&self) -> Result<ProcessConfig, SettingsError> {
        let proxy = &self.proxy;

        let executable = match &proxy.path {
            Some(path) => path.clone(),
            None if proxy.dev_mode => which::which(&proxy.binary_name)
                .map_err(|_| SettingsError::ProxyNotFound(proxy.binary_name.clone()))?,
            None => packaged_proxy_path(&proxy.binary_name)?,
        };

        let args = if proxy.dev_mode {
            proxy.dev_args.clone()
        } else {
            proxy.args.clone()
        };

        Ok(ProcessConfig::new(executable, args, proxy.line_limit)?)
    }
}

/// The packaged proxy sits in the same directory as the shell binary
fn packaged_proxy_path(binary_name: &str) -> Result<PathBuf, SettingsError> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| SettingsError::ProxyNotFound(binary_name.to_string()))?;
    Ok(dir.join(format!("{}{}", binary_name, std::env::consts::EXE_SUFFIX)))
}
