//! Append-only local access log.
//!
//! One line per proxied connection. The sink owns its own lock so callers
//! never coordinate; each line goes out in a single `write_all`, so lines from
//! concurrent connections interleave but are never torn.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, TimeZone};

/// Process-wide append-only sink for access lines.
pub struct AccessLog {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl AccessLog {
    /// Open (or create) the log file in append mode.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::info!(path = %path.display(), "Access log opened");
        Ok(Self::from_writer(file))
    }

    /// Wrap an arbitrary writer.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Append one already-terminated line.
    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }

    /// Flush buffered output (called at shutdown).
    pub fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

impl std::fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLog").finish_non_exhaustive()
    }
}

/// `[<RFC3339 timestamp>] <client_ip> -> <target>\n`
pub fn format_access_line<Tz>(at: &DateTime<Tz>, client_ip: &str, target: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[{}] {} -> {}\n",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        client_ip,
        target
    )
}
