//! Commands exposed to the UI
//!
//! Each command is a one-shot call into a host capability. Host failures
//! never propagate: they come back as [`CommandOutcome::Unavailable`].

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;

/// Git key probed for the default branch name
pub const GIT_DEFAULT_BRANCH_KEY: &str = "init.defaultBranch";

/// Result of a dispatched command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "camelCase")]
pub enum CommandOutcome {
    /// The command produced a value
    Value(Value),
    /// Completed without a value (e.g. the user cancelled a picker)
    NoResult,
    /// The host could not serve the request
    Unavailable(String),
}

/// Dispatch errors, i.e. misuse of the table rather than host failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },
}

/// Host capabilities the UI may trigger
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Show a directory picker. `None` when the user cancelled.
    async fn select_directory(&self) -> anyhow::Result<Option<PathBuf>>;

    async fn copy_to_clipboard(&self, text: String) -> anyhow::Result<()>;

    /// Open a file or directory with the system handler
    async fn open_path(&self, path: PathBuf) -> anyhow::Result<()>;

    /// Open a URL in the default browser
    async fn open_url(&self, url: String) -> anyhow::Result<()>;

    fn version(&self) -> String;

    /// Read a global git config value. `None` when the key is unset.
    async fn git_global_config(&self, key: &str) -> anyhow::Result<Option<String>>;
}

type Handler = Box<
    dyn Fn(Arc<dyn HostApi>, Value) -> BoxFuture<'static, Result<CommandOutcome, CommandError>>
        + Send
        + Sync,
>;

#[derive(Deserialize)]
struct TextArgs {
    text: String,
}

#[derive(Deserialize)]
struct PathArgs {
    path: PathBuf,
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

/// Name to host-call table
pub struct CommandTable {
    host: Arc<dyn HostApi>,
    handlers: HashMap<&'static str, Handler>,
}

impl CommandTable {
    /// Table with every built-in command registered
    pub fn with_host(host: Arc<dyn HostApi>) -> Self {
        let mut table = Self {
            host,
            handlers: HashMap::new(),
        };

        table.register("selectDirectory", select_directory);
        table.register("copyToClipboard", copy_to_clipboard);
        table.register("openPath", open_path);
        table.register("openUrl", open_url);
        table.register("getVersion", get_version);
        table.register("getGitGlobalDefaultBranch", get_git_global_default_branch);
        table
    }

    fn register<F, Fut>(&mut self, name: &'static str, handler: F)
    where
        F: Fn(Arc<dyn HostApi>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CommandOutcome, CommandError>> + Send + 'static,
    {
        self.handlers
            .insert(name, Box::new(move |host, args| handler(host, args).boxed()));
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run one command
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<CommandOutcome, CommandError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        tracing::debug!(command = name, "Dispatching UI command");
        handler(Arc::clone(&self.host), args).await
    }
}

async fn select_directory(
    host: Arc<dyn HostApi>,
    _args: Value,
) -> Result<CommandOutcome, CommandError> {
    Ok(match host.select_directory().await {
        Ok(Some(path)) => CommandOutcome::Value(Value::String(path.display().to_string())),
        Ok(None) => CommandOutcome::NoResult,
        Err(e) => unavailable("selectDirectory", e),
    })
}

async fn copy_to_clipboard(
    host: Arc<dyn HostApi>,
    args: Value,
) -> Result<CommandOutcome, CommandError> {
    let TextArgs { text } = parse_args("copyToClipboard", args)?;
    Ok(match host.copy_to_clipboard(text).await {
        Ok(()) => CommandOutcome::NoResult,
        Err(e) => unavailable("copyToClipboard", e),
    })
}

async fn open_path(host: Arc<dyn HostApi>, args: Value) -> Result<CommandOutcome, CommandError> {
    let PathArgs { path } = parse_args("openPath", args)?;
    Ok(match host.open_path(path).await {
        Ok(()) => CommandOutcome::NoResult,
        Err(e) => unavailable("openPath", e),
    })
}

async fn open_url(host: Arc<dyn HostApi>, args: Value) -> Result<CommandOutcome, CommandError> {
    let UrlArgs { url } = parse_args("openUrl", args)?;
    let url = validate_external_url(&url).ok_or_else(|| CommandError::InvalidArguments {
        command: "openUrl".to_string(),
        reason: format!("not an http(s) URL: {}", url),
    })?;
    Ok(match host.open_url(url).await {
        Ok(()) => CommandOutcome::NoResult,
        Err(e) => unavailable("openUrl", e),
    })
}

async fn get_version(host: Arc<dyn HostApi>, _args: Value) -> Result<CommandOutcome, CommandError> {
    Ok(CommandOutcome::Value(Value::String(host.version())))
}

async fn get_git_global_default_branch(
    host: Arc<dyn HostApi>,
    _args: Value,
) -> Result<CommandOutcome, CommandError> {
    Ok(match host.git_global_config(GIT_DEFAULT_BRANCH_KEY).await {
        Ok(Some(branch)) => CommandOutcome::Value(Value::String(branch)),
        Ok(None) => CommandOutcome::NoResult,
        Err(e) => unavailable("getGitGlobalDefaultBranch", e),
    })
}

fn parse_args<T: DeserializeOwned>(command: &str, args: Value) -> Result<T, CommandError> {
    serde_json::from_value(args).map_err(|e| CommandError::InvalidArguments {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

fn unavailable(command: &str, err: anyhow::Error) -> CommandOutcome {
    tracing::warn!(command, error = %err, "Host command unavailable");
    CommandOutcome::Unavailable(err.to_string())
}

/// Only web links leave the shell
fn validate_external_url(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Host backed by the real desktop
pub struct DesktopHost;

impl DesktopHost {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostApi for DesktopHost {
    async fn select_directory(&self) -> anyhow::Result<Option<PathBuf>> {
        let mut cmd = directory_picker();
        let output = cmd
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("directory picker unavailable: {}", e))?;

        // Pickers exit non-zero on cancel
        if !output.status.success() {
            return Ok(None);
        }

        let picked = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!picked.is_empty()).then(|| PathBuf::from(picked)))
    }

    async fn copy_to_clipboard(&self, text: String) -> anyhow::Result<()> {
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut clipboard = arboard::Clipboard::new()?;
            clipboard.set_text(text)?;
            Ok(())
        })
        .await?
    }

    async fn open_path(&self, path: PathBuf) -> anyhow::Result<()> {
        if !path.exists() {
            anyhow::bail!("path does not exist: {}", path.display());
        }
        tokio::task::spawn_blocking(move || open::that(&path)).await??;
        Ok(())
    }

    async fn open_url(&self, url: String) -> anyhow::Result<()> {
        tokio::task::spawn_blocking(move || open::that(&url)).await??;
        Ok(())
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    async fn git_global_config(&self, key: &str) -> anyhow::Result<Option<String>> {
        let output = Command::new("git")
            .args(["config", "--global", "--get", key])
            .stdin(Stdio::null())
            .output()
            .await?;

        match output.status.code() {
            Some(0) => {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!value.is_empty()).then_some(value))
            }
            // git exits 1 when the key is not set
            Some(1) => Ok(None),
            _ => anyhow::bail!(
                "git config failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

#[cfg(target_os = "macos")]
fn directory_picker() -> Command {
    let mut cmd = Command::new("osascript");
    cmd.args(["-e", "POSIX path of (choose folder)"]);
    cmd
}

#[cfg(target_os = "windows")]
fn directory_picker() -> Command {
    let script = r#"
        Add-Type -AssemblyName System.Windows.Forms
        $dialog = New-Object System.Windows.Forms.FolderBrowserDialog
        if ($dialog.ShowDialog() -eq 'OK') { $dialog.SelectedPath } else { exit 1 }
    "#;
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", script]);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn directory_picker() -> Command {
    let mut cmd = Command::new("zenity");
    cmd.args(["--file-selection", "--directory"]);
    cmd
}
