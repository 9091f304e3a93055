//! In-memory pipeline logger.

use parking_lot::Mutex;

use crate::observability::{HttpPipelineLogLevel, HttpPipelineLogger};

/// Keeps every accepted record for later inspection.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    minimum: HttpPipelineLogLevel,
    records: Mutex<Vec<(HttpPipelineLogLevel, String)>>,
}

impl RecordingLogger {
    /// Creates a logger accepting `minimum` and more severe records.
    #[must_use]
    pub const fn new(minimum: HttpPipelineLogLevel) -> Self {
        Self {
            minimum,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Returns all records in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<(HttpPipelineLogLevel, String)> {
        self.records.lock().clone()
    }

    /// Returns how many records were logged at exactly `level`.
    #[must_use]
    pub fn count_at(&self, level: HttpPipelineLogLevel) -> usize {
        self.records.lock().iter().filter(|(l, _)| *l == level).count()
    }

    /// Drops all records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl HttpPipelineLogger for RecordingLogger {
    fn minimum_log_level(&self) -> HttpPipelineLogLevel {
        self.minimum
    }

    fn log(&self, level: HttpPipelineLogLevel, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}
