//! JSONL log of everything the readout showed.
//!
//! Each line is one `DisplayEntry`. The log is opened in append mode so
//! consecutive runs accumulate in the same file.

use serde::{Deserialize, Serialize};
use speedo_core::{TextSink, TimeBase};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Types of events recorded in the display log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayEventType {
    SystemStart,
    /// Text written to the readout
    DisplayWritten,
    VisibilityChanged,
    /// Positioning produced its first fix
    LocationResolved,
    SystemShutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEntry {
    /// Monotonic timestamp in microseconds
    pub timestamp_us: u64,
    /// Wall-clock Unix timestamp in microseconds
    pub unix_us: u64,
    pub event_type: DisplayEventType,
    pub details: serde_json::Value,
}

pub struct DisplayLogger {
    writer: Mutex<BufWriter<File>>,
    timebase: TimeBase,
}

impl DisplayLogger {
    pub fn new(path: &Path, timebase: TimeBase) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
            timebase,
        })
    }

    pub fn log(&self, entry: &DisplayEntry) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("display log writer poisoned"))?;
        serde_json::to_writer(&mut *writer, entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Log an event stamped with the logger's own time base.
    pub fn log_event(
        &self,
        event_type: DisplayEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(&DisplayEntry {
            timestamp_us: self.timebase.now_us(),
            unix_us: self.timebase.unix_us(),
            event_type,
            details,
        })
    }
}

/// Text sink decorator that records every write to a `DisplayLogger`.
pub struct LoggedSink<S> {
    inner: S,
    logger: Option<Arc<DisplayLogger>>,
}

impl<S: TextSink> LoggedSink<S> {
    pub fn new(inner: S, logger: Option<Arc<DisplayLogger>>) -> Self {
        Self { inner, logger }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn record(&self, event_type: DisplayEventType, details: serde_json::Value) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log_event(event_type, details) {
                warn!(error = %e, "Failed to append to display log");
            }
        }
    }
}

impl<S: TextSink> TextSink for LoggedSink<S> {
    fn set_text(&mut self, text: &str) {
        self.inner.set_text(text);
        self.record(
            DisplayEventType::DisplayWritten,
            serde_json::json!({ "text": text }),
        );
    }

    fn set_visible(&mut self, visible: bool) {
        self.inner.set_visible(visible);
        self.record(
            DisplayEventType::VisibilityChanged,
            serde_json::json!({ "visible": visible }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedo_core::MemorySink;
    use tempfile::tempdir;

    fn read_entries(path: &Path) -> Vec<DisplayEntry> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn logger_writes_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("display.jsonl");

        let logger = DisplayLogger::new(&path, TimeBase::new()).unwrap();
        logger
            .log_event(
                DisplayEventType::SystemStart,
                serde_json::json!({"version": "0.1.0"}),
            )
            .unwrap();
        logger
            .log_event(
                DisplayEventType::DisplayWritten,
                serde_json::json!({"text": "0.0 mph"}),
            )
            .unwrap();

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, DisplayEventType::SystemStart);
        assert_eq!(entries[1].details["text"], "0.0 mph");
        assert!(entries[1].timestamp_us >= entries[0].timestamp_us);
    }

    #[test]
    fn logged_sink_records_writes_and_visibility() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("display.jsonl");
        let logger = Arc::new(DisplayLogger::new(&path, TimeBase::new()).unwrap());

        let mut sink = LoggedSink::new(MemorySink::new(), Some(logger));
        sink.set_text("12.5 mph");
        sink.set_visible(false);
        assert_eq!(sink.inner().text(), "12.5 mph");

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, DisplayEventType::DisplayWritten);
        assert_eq!(entries[1].event_type, DisplayEventType::VisibilityChanged);
        assert_eq!(entries[1].details["visible"], false);
    }

    #[test]
    fn logged_sink_without_logger_only_forwards() {
        let mut sink = LoggedSink::new(MemorySink::new(), None);
        sink.set_text("3.0 mph");
        assert_eq!(sink.inner().writes(), 1);
    }
}
