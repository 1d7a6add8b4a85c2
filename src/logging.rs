//! Logging configuration using tracing
//!
//! Logs go to stderr; stdout carries UI messages in headless mode.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "UPSTREAM_SHELL_LOG";

/// Initialize the logging system
pub fn init(verbose: bool, json: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info,proxy=warn"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
