//! Per-bot journal of recent events.
//!
//! Every entry is also forwarded to the `log` facade under the bot's name, so
//! the process log and the monitoring view never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of entries kept per bot.
pub const JOURNAL_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: JournalLevel,
    pub text: String,
}

/// Bounded FIFO of log entries; the oldest entry is evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(JOURNAL_CAPACITY)
    }
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, owner: &str, at: DateTime<Utc>, level: JournalLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            JournalLevel::Info => log::info!("[{owner}] {text}"),
            JournalLevel::Warn => log::warn!("[{owner}] {text}"),
            JournalLevel::Error => log::error!("[{owner}] {text}"),
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp: at,
            level,
            text,
        });
    }

    /// The `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<&LogEntry> {
        self.entries.iter().rev().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
