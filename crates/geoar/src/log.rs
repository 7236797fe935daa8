//! On-screen debug log.

use std::collections::VecDeque;

use web_time::{SystemTime, UNIX_EPOCH};

/// Entries kept before the oldest is dropped.
pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Wall-clock time, `HH:MM:SS` UTC.
    pub timestamp: String,
    pub message: String,
}

impl LogEntry {
    /// Single-line rendering for the panel.
    pub fn line(&self) -> String {
        format!("[{}] {}", self.timestamp, self.message)
    }
}

/// Bounded log, oldest first.
#[derive(Debug, Clone)]
pub struct DebugLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DebugLog {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message stamped with the current time.
    pub fn push(&mut self, message: impl Into<String>) {
        self.push_at(clock_time(SystemTime::now()), message);
    }

    /// Append a message with an explicit timestamp.
    pub fn push_at(&mut self, timestamp: String, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "geoar::debug_log", "{message}");
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry { timestamp, message });
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Format a wall-clock instant as `HH:MM:SS` UTC.
pub fn clock_time(time: SystemTime) -> String {
    let seconds = time
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
        % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_time() {
        let time = UNIX_EPOCH + Duration::from_secs(3 * 86_400 + 13 * 3600 + 5 * 60 + 9);
        assert_eq!(clock_time(time), "13:05:09");
        assert_eq!(clock_time(UNIX_EPOCH), "00:00:00");
    }

    #[test]
    fn test_bounded() {
        let mut log = DebugLog::with_capacity(3);
        for i in 0..5 {
            log.push_at("00:00:00".to_owned(), format!("entry {i}"));
        }
        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["entry 2", "entry 3", "entry 4"]);
        assert_eq!(log.latest().map(LogEntry::line).as_deref(), Some("[00:00:00] entry 4"));
    }

    #[test]
    fn test_push_stamps_entry() {
        let mut log = DebugLog::default();
        log.push("hello");
        let entry = log.latest().unwrap();
        assert_eq!(entry.timestamp.len(), 8);
        assert_eq!(entry.timestamp.as_bytes()[2], b':');
    }
}
