//! HTML report fragment
//!
//! Renders the record table as an HTML fragment with one row per record:
//! {measured function, caller, bytes used}. A fragment is always appended to
//! whatever the destination already holds, so successive runs accumulate in
//! one report file.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::ReportError;
use crate::report::{MeasurementLog, ReportSink};

/// Report sink producing an HTML table fragment
pub struct HtmlReport<W: Write> {
    writer: W,
}

impl<W: Write> HtmlReport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl HtmlReport<BufWriter<std::fs::File>> {
    /// Open a report file in append mode, creating it if needed.
    ///
    /// # Errors
    /// Fails if the file cannot be opened for appending.
    pub fn append_to(path: &Path) -> Result<Self, ReportError> {
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
            ReportError::Write { path: path.to_path_buf(), source: e }
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportSink for HtmlReport<W> {
    fn write_records(
        &mut self,
        log: &MeasurementLog,
        build_flags: &str,
    ) -> Result<(), ReportError> {
        let w = &mut self.writer;
        write!(
            w,
            "<br> The following stack consumption is achieved when the target is \
             built with the following flags: {}<br>\n",
            escape(build_flags)
        )?;
        writeln!(w, "<table>")?;
        writeln!(
            w,
            "<tr><th>measured function</th><th>caller</th><th>bytes used</th></tr>"
        )?;
        for record in log.records() {
            let used = if record.truncated {
                // The window edge was reached; the exact mark is unknown
                format!("&ge; {} (budget exceeded?)", record.used_bytes)
            } else {
                record.used_bytes.to_string()
            };
            writeln!(
                w,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&record.function),
                escape(&record.caller),
                used
            )?;
        }
        writeln!(w, "</table><br>")?;
        w.flush()?;
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
