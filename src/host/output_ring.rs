//! Output Ring
//!
//! Bounded log of the most recent lines a child process wrote to
//! stdout/stderr. Oldest lines are evicted first once the limit is hit.

use std::collections::VecDeque;

use super::supervisor::SupervisorError;

/// Rolling line buffer with a fixed capacity
#[derive(Debug, Clone)]
pub struct OutputRing {
    capacity: usize,
    lines: VecDeque<String>,
}

impl OutputRing {
    /// Create a ring holding at most `capacity` lines.
    ///
    /// A zero capacity is a configuration error and is rejected here rather
    /// than silently dropping every line later.
    pub fn new(capacity: usize) -> Result<Self, SupervisorError> {
        if capacity == 0 {
            return Err(SupervisorError::InvalidConfig(
                "line limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            lines: VecDeque::with_capacity(capacity.min(1024)),
        })
    }

    /// Append a line, evicting the oldest one when full
    pub fn append(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Current contents joined with newlines
    pub fn joined(&self) -> String {
        self.snapshot().join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
