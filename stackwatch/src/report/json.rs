//! JSON export of the record table, for machine consumption downstream

use serde::Serialize;
use std::io::Write;

use crate::domain::{MeasurementRecord, ReportError};
use crate::report::{MeasurementLog, ReportSink};

#[derive(Serialize)]
struct ReportDocument<'a> {
    build_flags: &'a str,
    records: &'a [MeasurementRecord],
}

/// Report sink producing a JSON document
pub struct JsonReport<W: Write> {
    writer: W,
}

impl<W: Write> JsonReport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ReportSink for JsonReport<W> {
    fn write_records(
        &mut self,
        log: &MeasurementLog,
        build_flags: &str,
    ) -> Result<(), ReportError> {
        let doc = ReportDocument { build_flags, records: log.records() };
        serde_json::to_writer_pretty(&mut self.writer, &doc)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_is_valid_json_with_all_fields() {
        let mut log = MeasurementLog::new();
        log.record(MeasurementRecord {
            function: "oscore2coap".to_string(),
            caller: "main".to_string(),
            used_bytes: 1208,
            truncated: false,
        });

        let mut buffer = Vec::new();
        JsonReport::new(&mut buffer).write_records(&log, "-DOPT=2").unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed["build_flags"], "-DOPT=2");
        assert_eq!(parsed["records"][0]["function"], "oscore2coap");
        assert_eq!(parsed["records"][0]["caller"], "main");
        assert_eq!(parsed["records"][0]["used_bytes"], 1208);
        assert_eq!(parsed["records"][0]["truncated"], false);
    }
}
