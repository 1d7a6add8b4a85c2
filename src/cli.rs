//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::settings::Settings;

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    /// The proxy exited non-zero, was signalled, or never started
    pub const PROXY_FAILED: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const COMMAND_FAILED: i32 = 4;
}

/// Desktop shell host for the backing proxy
#[derive(Debug, Parser)]
#[command(name = "upstream-shell", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long = "json", global = true)]
    pub json_output: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, env = "UPSTREAM_SHELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Protocol URL handed over by the OS
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the shell and supervise the proxy (default)
    Run(RunArgs),
    /// Invoke a single UI command and print its outcome
    Invoke(InvokeArgs),
    /// Show or initialize the launch configuration
    Config(ConfigArgs),
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Proxy executable to start
    #[arg(long, env = "UPSTREAM_SHELL_PROXY_PATH")]
    pub proxy_path: Option<PathBuf>,

    /// Number of proxy output lines kept for the exit report
    #[arg(long, env = "UPSTREAM_SHELL_LINE_LIMIT")]
    pub line_limit: Option<usize>,

    /// Development mode: find the proxy on PATH and use dev arguments
    #[arg(long)]
    pub dev: bool,

    /// Protocol URL handed over by the OS
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Arguments passed to the proxy, replacing the configured ones
    #[arg(last = true)]
    pub proxy_args: Vec<String>,
}

impl RunArgs {
    /// Layer command-line overrides over file settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.proxy_path {
            settings.proxy.path = Some(path.clone());
        }
        if let Some(limit) = self.line_limit {
            settings.proxy.line_limit = limit;
        }
        if self.dev {
            settings.proxy.dev_mode = true;
        }
        if !self.proxy_args.is_empty() {
            if settings.proxy.dev_mode {
                settings.proxy.dev_args = self.proxy_args.clone();
            } else {
                settings.proxy.args = self.proxy_args.clone();
            }
        }
    }
}

#[derive(Debug, Args)]
pub struct InvokeArgs {
    /// Command name, e.g. getVersion
    pub name: String,

    /// JSON arguments
    #[arg(default_value = "null")]
    pub args: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the default settings file if none exists
    #[arg(long)]
    pub init: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_has_no_subcommand() {
        let cli = Cli::parse_from(["upstream-shell"]);
        assert!(cli.command.is_none());
        assert!(cli.url.is_none());
    }

    #[test]
    fn test_protocol_url_positional() {
        let cli = Cli::parse_from(["upstream-shell", "radicle://link/v0/abc"]);
        assert_eq!(cli.url.as_deref(), Some("radicle://link/v0/abc"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::parse_from([
            "upstream-shell",
            "run",
            "--proxy-path",
            "/opt/proxy",
            "--line-limit",
            "7",
            "--",
            "--http-listen",
            "0.0.0.0:8080",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.proxy.path, Some(PathBuf::from("/opt/proxy")));
        assert_eq!(settings.proxy.line_limit, 7);
        assert_eq!(settings.proxy.args, vec!["--http-listen", "0.0.0.0:8080"]);
        assert!(settings.proxy.dev_args.is_empty());
    }

    #[test]
    fn test_dev_args_override() {
        let cli = Cli::parse_from(["upstream-shell", "run", "--dev", "--", "--dev-log"]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert!(settings.proxy.dev_mode);
        assert_eq!(settings.proxy.dev_args, vec!["--dev-log"]);
    }

    #[test]
    fn test_invoke_defaults_to_null_args() {
        let cli = Cli::parse_from(["upstream-shell", "invoke", "getVersion"]);
        let Some(Commands::Invoke(args)) = cli.command else {
            panic!("expected invoke");
        };
        assert_eq!(args.name, "getVersion");
        assert_eq!(args.args, "null");
    }
}
