// src/output.rs
use chrono::{DateTime, Local};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Timestamp layout of the stdout sink, e.g. `2024/05/01 13:37:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Destination for the lines produced by the receiver.
pub trait OutputSink: Send + Sync {
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Prefixes a local timestamp to every line.
pub fn timestamped(at: DateTime<Local>, line: &str) -> String {
    format!("{} {}", at.format(TIMESTAMP_FORMAT), line)
}

/// Writes timestamped lines to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", timestamped(Local::now(), line))?;
        out.flush()
    }
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl OutputSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self
            .lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink lock poisoned"))?;
        guard.push(line.to_string());
        Ok(())
    }
}
