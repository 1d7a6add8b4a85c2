//! Upstream Shell - desktop host for the backing proxy process
//!
//! Launches the proxy, captures its recent output, and reports how it
//! terminated to the UI listener:
//! - `upstream-shell [URL]` / `upstream-shell run` runs the shell headless,
//!   printing UI messages as JSON lines on stdout
//! - `upstream-shell invoke <name> [json]` runs one UI command
//! - `upstream-shell config` shows the resolved launch configuration

mod app;
mod cli;
mod commands;
mod core;
mod host;
mod logging;
mod protocol;
mod settings;
mod ui;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use cli::{exit_codes, Cli, Commands, ConfigArgs, InvokeArgs, RunArgs};

use crate::app::AppContext;
use crate::commands::{CommandTable, DesktopHost};
use crate::settings::Settings;
use crate::ui::JsonLinesListener;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = logging::init(cli.verbose, cli.json_output) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let settings = load_settings(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run(args)) => rt.block_on(run_shell(settings, args)),
        Some(Commands::Invoke(args)) => rt.block_on(invoke(args)),
        Some(Commands::Config(args)) => show_config(settings, cli.config.as_deref(), args),
        None => {
            let args = RunArgs {
                url: cli.url,
                ..Default::default()
            };
            rt.block_on(run_shell(settings, args))
        }
    }
}

fn load_settings(path: Option<&Path>) -> Settings {
    match path {
        Some(path) => match Settings::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Using default settings");
                Settings::default()
            }
        },
        None => Settings::load(),
    }
}

/// Run the shell until the proxy terminates or Ctrl-C arrives
async fn run_shell(mut settings: Settings, args: RunArgs) -> i32 {
    args.apply(&mut settings);

    let ctx = match AppContext::new(settings) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = %e, "Cannot launch proxy");
            return exit_codes::CONFIG_ERROR;
        }
    };

    tracing::info!(
        proxy = %ctx.supervisor().config().executable.display(),
        args = ?ctx.supervisor().config().args,
        "Launching proxy"
    );

    // Buffered until the UI attaches below
    ctx.handle_protocol_args(args.url.iter());

    let mut proxy = ctx.on_ready();
    ctx.attach_ui(JsonLinesListener::stdout());

    let joined = tokio::select! {
        joined = &mut proxy => joined,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received");
            ctx.shutdown();
            proxy.await
        }
    };
    ctx.detach_ui();
    ctx.shutdown();

    match joined {
        Ok(Some(report)) if report.is_clean() => exit_codes::SUCCESS,
        Ok(_) => exit_codes::PROXY_FAILED,
        Err(e) => {
            tracing::error!(error = %e, "Proxy task failed");
            exit_codes::UNEXPECTED_FAILURE
        }
    }
}

/// Run a single UI command against the desktop host
async fn invoke(args: InvokeArgs) -> i32 {
    let params: serde_json::Value = match serde_json::from_str(&args.args) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("Error: arguments are not valid JSON: {}", e);
            return exit_codes::COMMAND_FAILED;
        }
    };

    let table = CommandTable::with_host(Arc::new(DesktopHost::new()));
    match table.dispatch(&args.name, params).await {
        Ok(outcome) => match serde_json::to_string(&outcome) {
            Ok(json) => {
                println!("{}", json);
                exit_codes::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                exit_codes::UNEXPECTED_FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, commands::CommandError::UnknownCommand(_)) {
                eprintln!("Available commands: {}", table.names().join(", "));
            }
            exit_codes::COMMAND_FAILED
        }
    }
}

fn show_config(settings: Settings, path: Option<&Path>, args: ConfigArgs) -> i32 {
    let path = path.map(Path::to_path_buf).or_else(Settings::default_path);

    if args.init {
        let Some(path) = &path else {
            eprintln!("Error: no settings location available");
            return exit_codes::CONFIG_ERROR;
        };
        if path.exists() {
            println!("Settings already exist at {}", path.display());
        } else if let Err(e) = Settings::default().save_to(path) {
            eprintln!("Error: {}", e);
            return exit_codes::CONFIG_ERROR;
        } else {
            println!("Wrote default settings to {}", path.display());
        }
    }

    if let Some(path) = &path {
        println!("Settings file: {}", path.display());
    }
    println!("Protocol scheme: {}", settings.protocol_scheme);

    match settings.resolve_launch() {
        Ok(launch) => {
            println!("Proxy: {}", launch.executable.display());
            println!("Arguments: {:?}", launch.args);
            println!("Line limit: {}", launch.line_limit);
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::CONFIG_ERROR
        }
    }
}
