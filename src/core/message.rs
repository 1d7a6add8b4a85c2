//! Messages pushed from the shell to the UI listener

use serde::{Deserialize, Serialize};

use crate::host::ExitReport;

/// Asynchronous notification addressed to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum ShellMessage {
    /// The backing proxy terminated, for whatever reason
    ProxyError(ExitReport),
    /// The shell was activated through its custom URL scheme
    CustomProtocolInvocation { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_error_json() {
        let msg = ShellMessage::ProxyError(ExitReport {
            exit_code: None,
            signal: Some("SIGKILL".to_string()),
            output: "bye".to_string(),
        });
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "ProxyError");
        assert_eq!(json["content"]["signal"], "SIGKILL");
        assert!(json["content"]["status"].is_null());
    }

    #[test]
    fn test_protocol_invocation_json() {
        let msg = ShellMessage::CustomProtocolInvocation {
            url: "radicle://link/v0/rad:git:hnrk".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(
            json,
            r#"{"type":"CustomProtocolInvocation","content":{"url":"radicle://link/v0/rad:git:hnrk"}}"#
        );
        let back: ShellMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
