//! Structured logging for the CLI demo, independent of `chimera_core`'s
//! in-process [`chimera_core::logging::LogCollector`] (which only buffers
//! entries for a worker's owner to drain — the CLI is that owner, and picks
//! its own process-wide output format here).

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Modulate(ModulateEvent),
    Demodulate(DemodulateEvent),
    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulateEvent {
    pub timestamp: DateTime<Utc>,
    pub profile: String,
    pub payload_bytes: usize,
    pub frames_rendered: usize,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemodulateEvent {
    pub timestamp: DateTime<Utc>,
    pub profile: String,
    pub frames_scanned: usize,
    pub payload_recovered: bool,
}

pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("file path required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => serde_json::to_string(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{output}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::Modulate(m) => format!(
                "ts=\"{}\" type=modulate profile=\"{}\" payload_bytes={} frames={} duration_secs={:.2}",
                ts, m.profile, m.payload_bytes, m.frames_rendered, m.duration_secs
            ),
            LogEvent::Demodulate(d) => format!(
                "ts=\"{}\" type=demodulate profile=\"{}\" frames_scanned={} recovered={}",
                ts, d.profile, d.frames_scanned, d.payload_recovered
            ),
            LogEvent::Info { message } => format!("ts=\"{ts}\" level=info msg=\"{message}\""),
            LogEvent::Warn { message } => format!("ts=\"{ts}\" level=warn msg=\"{message}\""),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{ts}\" level=error msg=\"{message}\" details=\"{d}\""),
                None => format!("ts=\"{ts}\" level=error msg=\"{message}\""),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::Modulate(m) => format!(
                "[{}] MODULATE: profile=\"{}\" payload={}B frames={} ({:.2}s)",
                ts, m.profile, m.payload_bytes, m.frames_rendered, m.duration_secs
            ),
            LogEvent::Demodulate(d) => format!(
                "[{}] DEMODULATE: profile=\"{}\" scanned {} frames | recovered={}",
                ts, d.profile, d.frames_scanned, d.payload_recovered
            ),
            LogEvent::Info { message } => format!("[{ts}] INFO: {message}"),
            LogEvent::Warn { message } => format!("[{ts}] WARN: {message}"),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{ts}] ERROR: {message} | {d}"),
                None => format!("[{ts}] ERROR: {message}"),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
