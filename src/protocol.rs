//! Custom URL scheme activation
//!
//! The OS hands protocol URLs to the shell through process arguments, either
//! on first launch or forwarded from a second instance. Valid ones become
//! [`ShellMessage::CustomProtocolInvocation`] messages for the UI.

use url::Url;

use crate::core::ShellMessage;

/// Longest URL accepted from the OS
pub const MAX_URL_LEN: usize = 1024;

/// Parse `raw` if it is a well-formed URL using `scheme`
pub fn parse_url(raw: &str, scheme: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.len() > MAX_URL_LEN {
        tracing::warn!(len = raw.len(), "Ignoring oversized protocol URL");
        return None;
    }

    match Url::parse(raw) {
        Ok(url) if url.scheme().eq_ignore_ascii_case(scheme) => Some(url),
        Ok(url) => {
            tracing::debug!(scheme = url.scheme(), "Ignoring URL with foreign scheme");
            None
        }
        Err(_) => None,
    }
}

/// First argument that is a valid protocol URL
pub fn find_url_in_args<I, S>(args: I, scheme: &str) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().find_map(|arg| {
        let arg = arg.as_ref();
        parse_url(arg, scheme).map(|_| arg.trim().to_string())
    })
}

/// Build the UI message for a protocol activation
pub fn invocation<I, S>(args: I, scheme: &str) -> Option<ShellMessage>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let url = find_url_in_args(args, scheme)?;
    tracing::info!(%url, "Custom protocol invocation");
    Some(ShellMessage::CustomProtocolInvocation { url })
}
