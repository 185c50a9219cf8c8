//! JSONL journal of idle/active transitions.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Journal entry types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SessionEvent {
    #[serde(rename = "session_start")]
    SessionStart {
        timestamp: DateTime<Utc>,
        version: String,
        timeout_ms: u64,
    },
    #[serde(rename = "session_end")]
    SessionEnd {
        timestamp: DateTime<Utc>,
        total_idle_ms: u64,
        total_active_ms: u64,
    },
    #[serde(rename = "idle_start")]
    IdleStart {
        timestamp: DateTime<Utc>,
        idle_since: Option<DateTime<Utc>>,
    },
    #[serde(rename = "idle_end")]
    IdleEnd {
        timestamp: DateTime<Utc>,
        idle_duration_ms: u64,
    },
    #[serde(rename = "paused")]
    Paused {
        timestamp: DateTime<Utc>,
        remaining_ms: u64,
    },
    #[serde(rename = "resumed")]
    Resumed {
        timestamp: DateTime<Utc>,
        remaining_ms: u64,
    },
}

/// Appends journal entries to one file per local day.
pub struct JsonlLogger {
    logs_dir: PathBuf,
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
    idle_since: Option<DateTime<Utc>>,
}

impl JsonlLogger {
    /// Create a new JSONL logger.
    pub fn new(logs_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        Ok(Self {
            logs_dir,
            current_file: None,
            current_date: None,
            idle_since: None,
        })
    }

    /// Get or create the log file for today.
    fn get_writer(&mut self) -> Result<&mut BufWriter<File>> {
        let today = Local::now().format("%Y-%m-%d").to_string();

        if self.current_date.as_ref() != Some(&today) {
            let log_path = self.logs_dir.join(format!("{}.jsonl", today));

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

            self.current_file = Some(BufWriter::new(file));
            self.current_date = Some(today);

            debug!("Opened log file: {:?}", log_path);
        }

        self.current_file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No log file available"))
    }

    /// Write a line to the JSONL log.
    fn write_line<T: Serialize>(&mut self, entry: &T) -> Result<()> {
        let line = serde_json::to_string(entry)?;
        let writer = self.get_writer()?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    /// Log session start event.
    pub fn log_session_start(&mut self, version: &str, timeout: Duration) -> Result<()> {
        let event = SessionEvent::SessionStart {
            timestamp: Utc::now(),
            version: version.to_string(),
            timeout_ms: millis(timeout),
        };
        info!("Session started");
        self.write_line(&event)
    }

    /// Log session end event.
    pub fn log_session_end(&mut self, total_idle: Duration, total_active: Duration) -> Result<()> {
        let event = SessionEvent::SessionEnd {
            timestamp: Utc::now(),
            total_idle_ms: millis(total_idle),
            total_active_ms: millis(total_active),
        };
        info!(
            "Session ended: idle {:?}, active {:?}",
            total_idle, total_active
        );
        self.write_line(&event)
    }

    /// Log the start of an idle interval that began at `since`.
    pub fn log_idle_start(&mut self, since: Option<DateTime<Utc>>) -> Result<()> {
        self.idle_since = since.or_else(|| Some(Utc::now()));
        let event = SessionEvent::IdleStart {
            timestamp: Utc::now(),
            idle_since: since,
        };
        self.write_line(&event)
    }

    /// Log the end of the current idle interval.
    pub fn log_idle_end(&mut self) -> Result<()> {
        let now = Utc::now();
        let idle_duration_ms = self
            .idle_since
            .take()
            .map(|since| (now - since).num_milliseconds().max(0) as u64)
            .unwrap_or(0);

        let event = SessionEvent::IdleEnd {
            timestamp: now,
            idle_duration_ms,
        };
        self.write_line(&event)
    }

    pub fn log_paused(&mut self, remaining: Duration) -> Result<()> {
        self.write_line(&SessionEvent::Paused {
            timestamp: Utc::now(),
            remaining_ms: millis(remaining),
        })
    }

    pub fn log_resumed(&mut self, remaining: Duration) -> Result<()> {
        self.write_line(&SessionEvent::Resumed {
            timestamp: Utc::now(),
            remaining_ms: millis(remaining),
        })
    }

    /// Start of the idle interval currently open in the journal.
    pub fn idle_since(&self) -> Option<DateTime<Utc>> {
        self.idle_since
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        if let Some(ref mut writer) = self.current_file {
            let _ = writer.flush();
        }
    }
}
