//! I/O boundary traits: §4.8 of the pipeline design.
//!
//! The pipeline core owns neither I/O nor timing. These small interfaces
//! mirror the teacher's pattern of narrow trait boundaries at integration
//! seams; the CLI binary supplies concrete line-delimited-JSON
//! implementations over stdin/stdout.

use std::io::{BufRead, Write};

use serde::Deserialize;

use crate::emit::StepRecord;

/// One inbound sample, after JSON parsing but before admission filtering.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundSample {
    /// The timestamp exactly as received, passed through to emission.
    pub timestamp: String,
    /// The same timestamp, normalized to Unix seconds, driving the engine's
    /// internal dynamics. Populated by the ingestion boundary.
    #[serde(skip)]
    pub timestamp_seconds: f64,
    pub heart_rate: i64,
    pub rr_intervals: Vec<i64>,
    #[serde(default)]
    pub sensor_contact: bool,
}

/// Error produced while decoding a raw inbound record. Never surfaces past
/// the ingestion boundary into the pipeline core.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed sample on line {line}: {source}")]
    MalformedSample { line: usize, source: serde_json::Error },
    #[error("sample on line {line} has a non-numeric or missing timestamp")]
    UnparseableTimestamp { line: usize },
}

/// Produces inbound samples one at a time. Returns `None` when the stream
/// is exhausted.
pub trait InputSink {
    fn next_sample(&mut self) -> Option<InboundSample>;
}

/// Receives one finished step record per pipeline step.
pub trait EmissionSink {
    fn on_step(&mut self, step: &StepRecord);
}

/// Parse an ISO-8601 or epoch-seconds timestamp string into Unix seconds.
/// Accepts plain epoch seconds (`"1700000000.5"`) directly; anything else
/// is delegated to the caller's own calendar-aware parser (kept out of this
/// crate to stay `chrono`-free), with a naive fallback in the meantime.
pub fn parse_timestamp_seconds(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Line-delimited-JSON `InputSink` reading from any `BufRead`, skipping and
/// logging malformed lines rather than propagating them into the pipeline.
pub struct JsonLinesInputSink<R: BufRead> {
    reader: R,
    line_no: usize,
}

impl<R: BufRead> JsonLinesInputSink<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line_no: 0 }
    }
}

impl<R: BufRead> InputSink for JsonLinesInputSink<R> {
    fn next_sample(&mut self) -> Option<InboundSample> {
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).ok()?;
            if read == 0 {
                return None;
            }
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundSample>(trimmed) {
                Ok(mut sample) => match parse_timestamp_seconds(&sample.timestamp) {
                    Some(seconds) => {
                        sample.timestamp_seconds = seconds;
                        return Some(sample);
                    }
                    None => {
                        let error = IngestError::UnparseableTimestamp { line: self.line_no };
                        tracing::warn!(error = %error, "skipping sample");
                        continue;
                    }
                },
                Err(source) => {
                    let error = IngestError::MalformedSample { line: self.line_no, source };
                    tracing::warn!(error = %error, "skipping sample");
                    continue;
                }
            }
        }
    }
}

/// Line-delimited-JSON `EmissionSink` writing to any `Write`.
pub struct JsonLinesEmissionSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesEmissionSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header(&mut self, schema_version: &str) -> std::io::Result<()> {
        let header = crate::emit::session_header(schema_version);
        writeln!(self.writer, "{}", header)
    }
}

impl<W: Write> EmissionSink for JsonLinesEmissionSink<W> {
    fn on_step(&mut self, step: &StepRecord) {
        match serde_json::to_string(step) {
            Ok(line) => {
                if let Err(err) = writeln!(self.writer, "{}", line) {
                    tracing::warn!(error = %err, "failed to write step record");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize step record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_malformed_lines() {
        let input = "not json\n{\"timestamp\":\"1700000000\",\"heart_rate\":60,\"rr_intervals\":[800,810]}\n";
        let mut sink = JsonLinesInputSink::new(Cursor::new(input));
        let sample = sink.next_sample().expect("expected a valid sample after the bad line");
        assert_eq!(sample.heart_rate, 60);
        assert_eq!(sample.timestamp_seconds, 1_700_000_000.0);
        assert!(sink.next_sample().is_none());
    }

    #[test]
    fn parses_epoch_seconds() {
        assert_eq!(parse_timestamp_seconds("1700000000.25"), Some(1_700_000_000.25));
        assert_eq!(parse_timestamp_seconds("not-a-number"), None);
    }
}
