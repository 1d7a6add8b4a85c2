//! Headless UI surface
//!
//! Without a window the shell prints every delivered message as one JSON
//! object per line, so a frontend process can consume stdout.

use std::io::Write;

use serde::Serialize;

use crate::core::Listener;

/// Writes each message as a JSON line
pub struct JsonLinesListener<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesListener<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesListener<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<M, W> Listener<M> for JsonLinesListener<W>
where
    M: Serialize + Send,
    W: Write + Send,
{
    fn deliver(&mut self, message: M) -> Result<(), M> {
        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                // Unserializable messages can never be delivered; drop them
                tracing::error!(error = %e, "Failed to encode UI message");
                return Ok(());
            }
        };

        let written = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush());
        match written {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "UI output closed");
                Err(message)
            }
        }
    }
}
