//! Application context
//!
//! Owns the proxy supervisor and the UI message queue for the lifetime of
//! the shell. Created at startup, `shutdown()` at teardown.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::core::{DeliveryQueue, Listener, ShellMessage};
use crate::host::{ExitReport, ProcessConfig, ProxySupervisor, SupervisorError};
use crate::protocol;
use crate::settings::{Settings, SettingsError};

pub struct AppContext {
    settings: Settings,
    supervisor: Arc<ProxySupervisor>,
    messages: Arc<DeliveryQueue<ShellMessage>>,
}

impl AppContext {
    /// Build the context, resolving the proxy launch from settings
    pub fn new(settings: Settings) -> Result<Self, SettingsError> {
        let config = settings.resolve_launch()?;
        Ok(Self::with_config(settings, config)?)
    }

    pub fn with_config(settings: Settings, config: ProcessConfig) -> Result<Self, SupervisorError> {
        Ok(Self {
            settings,
            supervisor: Arc::new(ProxySupervisor::new(config)?),
            messages: Arc::new(DeliveryQueue::new()),
        })
    }

    pub fn supervisor(&self) -> &ProxySupervisor {
        &self.supervisor
    }

    pub fn messages(&self) -> &DeliveryQueue<ShellMessage> {
        &self.messages
    }

    /// Start the proxy. Its exit report is forwarded to the UI as
    /// [`ShellMessage::ProxyError`] and also returned through the handle.
    pub fn on_ready(&self) -> JoinHandle<Option<ExitReport>> {
        let supervisor = Arc::clone(&self.supervisor);
        let messages = Arc::clone(&self.messages);

        tokio::spawn(async move {
            match supervisor.run().await {
                Ok(report) => {
                    if !report.is_clean() {
                        tracing::warn!(
                            status = ?report.exit_code,
                            signal = ?report.signal,
                            "Proxy exited abnormally"
                        );
                    }
                    messages.send(ShellMessage::ProxyError(report.clone()));
                    Some(report)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring repeated start request");
                    None
                }
            }
        })
    }

    /// Attach the UI once it has finished loading
    pub fn attach_ui(&self, listener: impl Listener<ShellMessage> + 'static) -> usize {
        self.messages.attach(listener)
    }

    /// Detach the UI when its surface is destroyed
    pub fn detach_ui(&self) -> bool {
        self.messages.detach()
    }

    /// Forward a protocol URL found in `args`, if any
    pub fn handle_protocol_args<I, S>(&self, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match protocol::invocation(args, &self.settings.protocol_scheme) {
            Some(message) => {
                self.messages.send(message);
                true
            }
            None => false,
        }
    }

    /// Kill the proxy; safe in any state
    pub fn shutdown(&self) {
        tracing::info!("Shutting down shell");
        self.supervisor.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SupervisorState;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn context(script: &str) -> AppContext {
        let config = ProcessConfig::new(
            "/bin/sh",
            vec!["-c".to_string(), script.to_string()],
            50,
        )
        .unwrap();
        AppContext::with_config(Settings::default(), config).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_settings() {
        let mut settings = Settings::default();
        settings.proxy.path = Some(PathBuf::from("/opt/proxy"));
        settings.proxy.line_limit = 0;
        assert!(AppContext::new(settings).is_err());
    }

    #[test]
    fn test_shutdown_before_ready() {
        let ctx = context("exit 0");
        ctx.shutdown();
        ctx.shutdown();
        assert_eq!(ctx.supervisor().state(), SupervisorState::Idle);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_report_delivered_to_late_listener() {
        let ctx = context("echo alpha; echo beta; echo gamma; exit 2");

        let report = ctx.on_ready().await.unwrap().unwrap();
        assert_eq!(report.exit_code, Some(2));
        assert_eq!(report.output, "alpha\nbeta\ngamma");
        assert_eq!(ctx.messages().pending(), 1);

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(ctx.attach_ui(tx), 1);

        assert_eq!(rx.recv().await, Some(ShellMessage::ProxyError(report)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_protocol_then_proxy_order() {
        let ctx = context("exit 0");
        assert!(ctx.handle_protocol_args(["shell", "radicle://link/v0/one"]));
        assert!(!ctx.handle_protocol_args(["shell", "--verbose"]));

        let report = ctx.on_ready().await.unwrap().unwrap();
        assert!(report.is_clean());

        let (tx, mut rx) = mpsc::unbounded_channel();
        ctx.attach_ui(tx);
        assert_eq!(
            rx.recv().await,
            Some(ShellMessage::CustomProtocolInvocation {
                url: "radicle://link/v0/one".to_string()
            })
        );
        assert_eq!(rx.recv().await, Some(ShellMessage::ProxyError(report)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_kills_running_proxy() {
        let ctx = context("exec sleep 30");
        let (tx, mut rx) = mpsc::unbounded_channel();
        ctx.attach_ui(tx);

        let handle = ctx.on_ready();
        while ctx.supervisor().state() != SupervisorState::Running {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        ctx.shutdown();

        let report = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(report.signal.is_some());
        assert_eq!(rx.recv().await, Some(ShellMessage::ProxyError(report)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_second_ready_is_ignored() {
        let ctx = context("exit 0");
        assert!(ctx.on_ready().await.unwrap().is_some());
        assert!(ctx.on_ready().await.unwrap().is_none());
        assert_eq!(ctx.messages().pending(), 1);
    }
}
