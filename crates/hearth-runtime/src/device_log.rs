// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Hearth.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Structured device log shipped over the bus.
//!
//! Urgent entries (ERROR and above) leave immediately, taking the buffer
//! with them so the receiver sees entries in sequence order. Everything else
//! waits until the buffer fills or the flush interval passes.

use crate::clock::elapsed_ms;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

pub const DEFAULT_LOG_CAPACITY: usize = 10;
pub const DEFAULT_LOG_FLUSH_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn is_urgent(self) -> bool {
        self >= Self::Error
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    /// Monotonic milliseconds
    pub timestamp: u64,
    pub sequence: u64,
}

#[derive(Debug)]
pub struct DeviceLog {
    buffer: Vec<LogEntry>,
    capacity: usize,
    min_level: LogLevel,
    flush_interval_ms: u64,
    last_flush_ms: u64,
    sequence: u64,
}

impl Default for DeviceLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY, LogLevel::Info, DEFAULT_LOG_FLUSH_MS)
    }
}

impl DeviceLog {
    pub fn new(capacity: usize, min_level: LogLevel, flush_interval_ms: u64) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            min_level,
            flush_interval_ms,
            last_flush_ms: 0,
            sequence: 0,
        }
    }

    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Record an entry and return whatever is now due for shipping.
    pub fn record(
        &mut self,
        level: LogLevel,
        component: &str,
        message: &str,
        now: u64,
    ) -> Vec<LogEntry> {
        mirror(level, component, message);

        if level < self.min_level {
            return Vec::new();
        }

        self.sequence += 1;
        self.buffer.push(LogEntry {
            level,
            component: component.to_owned(),
            message: message.to_owned(),
            timestamp: now,
            sequence: self.sequence,
        });

        if level.is_urgent() || self.buffer.len() >= self.capacity {
            return self.flush(now);
        }
        self.poll(now)
    }

    /// Time-based flush, called from housekeeping
    pub fn poll(&mut self, now: u64) -> Vec<LogEntry> {
        if !self.buffer.is_empty() && elapsed_ms(now, self.last_flush_ms) >= self.flush_interval_ms
        {
            return self.flush(now);
        }
        Vec::new()
    }

    pub fn flush(&mut self, now: u64) -> Vec<LogEntry> {
        self.last_flush_ms = now;
        std::mem::take(&mut self.buffer)
    }
}

fn mirror(level: LogLevel, component: &str, message: &str) {
    match level {
        LogLevel::Debug => debug!(component, "{message}"),
        LogLevel::Info => info!(component, "{message}"),
        LogLevel::Warning => warn!(component, "{message}"),
        LogLevel::Error | LogLevel::Critical => error!(component, level = %level, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_minimum_is_dropped() {
        let mut log = DeviceLog::default();
        assert!(log.record(LogLevel::Debug, "app", "noise", 0).is_empty());
        assert_eq!(log.buffered(), 0);
    }

    #[test]
    fn test_info_is_buffered_until_full() {
        let mut log = DeviceLog::new(3, LogLevel::Info, 60_000);
        assert!(log.record(LogLevel::Info, "app", "one", 1).is_empty());
        assert!(log.record(LogLevel::Warning, "app", "two", 2).is_empty());

        let shipped = log.record(LogLevel::Info, "app", "three", 3);
        assert_eq!(shipped.len(), 3);
        assert_eq!(
            shipped.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(log.buffered(), 0);
    }

    #[test]
    fn test_error_ships_immediately_with_buffer() {
        let mut log = DeviceLog::default();
        log.record(LogLevel::Info, "app", "warming up", 1);

        let shipped = log.record(LogLevel::Error, "app", "sensor dead", 2);
        assert_eq!(shipped.len(), 2);
        assert_eq!(shipped[0].message, "warming up");
        assert_eq!(shipped[1].level, LogLevel::Error);
    }

    #[test]
    fn test_interval_flush() {
        let mut log = DeviceLog::new(10, LogLevel::Info, 1000);
        log.record(LogLevel::Info, "app", "a", 10);
        assert!(log.poll(999).is_empty());
        assert_eq!(log.poll(1000).len(), 1);
        assert!(log.poll(5000).is_empty());
    }

    #[test]
    fn test_entry_serializes_uppercase_level() {
        let entry = LogEntry {
            level: LogLevel::Warning,
            component: "app".to_owned(),
            message: "m".to_owned(),
            timestamp: 5,
            sequence: 1,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "WARNING");
    }
}
