//! Measurement aggregation and report output
//!
//! The log is pure data collection: records append in the order they were
//! produced and are never deduplicated, merged, or reordered. Rendering goes
//! through the [`ReportSink`] trait so the table can be written to any
//! destination, which keeps the core testable without filesystem side
//! effects.

pub mod html;
pub mod json;

pub use html::HtmlReport;
pub use json::JsonReport;

use log::info;

use crate::domain::{MeasurementRecord, ReportError};

/// Ordered, append-only table of measurement records
#[derive(Debug, Default)]
pub struct MeasurementLog {
    records: Vec<MeasurementRecord>,
}

impl MeasurementLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Insertion order is the temporal order the
    /// measurements completed in and is preserved for reporting.
    pub fn record(&mut self, record: MeasurementRecord) {
        info!(
            "{} called by {}: {} bytes{}",
            record.function,
            record.caller,
            record.used_bytes,
            if record.truncated { " (budget exceeded?)" } else { "" }
        );
        self.records.push(record);
    }

    /// Read-only view over all records, in occurrence order
    #[must_use]
    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records for one function (a never-called function has 0;
    /// that is not an error)
    #[must_use]
    pub fn count_for(&self, function: &str) -> usize {
        self.records.iter().filter(|r| r.function == function).count()
    }
}

/// Destination for the finished record table
pub trait ReportSink {
    /// Write one report section: every record currently in the log plus the
    /// free-text build configuration note.
    ///
    /// # Errors
    /// Propagates I/O and serialization failures of the destination.
    fn write_records(&mut self, log: &MeasurementLog, build_flags: &str)
        -> Result<(), ReportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(function: &str, used: usize) -> MeasurementRecord {
        MeasurementRecord {
            function: function.to_string(),
            caller: "main".to_string(),
            used_bytes: used,
            truncated: false,
        }
    }

    #[test]
    fn test_log_preserves_insertion_order() {
        let mut log = MeasurementLog::new();
        log.record(rec("b", 200));
        log.record(rec("a", 100));
        log.record(rec("b", 150));

        let used: Vec<usize> = log.records().iter().map(|r| r.used_bytes).collect();
        assert_eq!(used, vec![200, 100, 150]);
    }

    #[test]
    fn test_repeat_invocations_are_all_retained() {
        let mut log = MeasurementLog::new();
        for _ in 0..3 {
            log.record(rec("recurse", 64));
        }
        assert_eq!(log.count_for("recurse"), 3);
        assert_eq!(log.count_for("never_called"), 0);
    }
}
