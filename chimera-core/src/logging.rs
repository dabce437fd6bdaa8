//! In-process structured logging for the Core worker.
//!
//! Per §9 Design Notes, the logger is an explicit component owned by the
//! application root rather than an ambient singleton. `chimera-core` only
//! *collects* entries (bounded, cheap, allocation-free on the steady-state
//! path beyond the `Vec::push`); `chimera-cli` owns the process-wide
//! formatting/output policy (see its own `logging` module).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Bounded ring of recent log entries, drained by the owner of the Core
/// worker (a CLI, a UI layer, a test harness).
#[derive(Debug, Clone)]
pub struct LogCollector {
    config: LogConfig,
    entries: Vec<LogEntry>,
}

impl LogCollector {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if level < self.config.level {
            return;
        }
        if self.config.max_entries == 0 {
            return;
        }
        if self.entries.len() >= self.config.max_entries {
            self.entries.remove(0);
        }
        self.entries.push(LogEntry {
            level,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Drain all entries accumulated since the last drain.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }
}

impl Default for LogCollector {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}
