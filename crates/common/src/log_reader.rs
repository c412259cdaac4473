//! Timing log readers
//!
//! Two persisted shapes exist:
//!
//! ```text
//! lines     {"name":"scix.first-author.normal.TTRL","duration":500}   one object per line
//! averaged  [{"name":"scix.first-author.normal.TTRL","avgTime":500}]  one JSON array
//! ```
//!
//! Both are read through [`LogReader`] so the aggregator never needs to know which one
//! it was given. Entries are produced lazily and each call to [`LogReader::entries`]
//! reopens the file.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, PipelineStage, Result};
use crate::record::{AveragedTiming, LogEntry, SkipReason, TimingRecord};
use crate::sample_name::TimingSampleName;

/// Marker a line must contain to be considered a timing record
pub const DEFAULT_RECORD_MARKER: &str = "name";

/// Scenario groups and throttle conditions left out of reports by default
pub const DEFAULT_EXCLUDE_MARKERS: [&str; 2] = ["test-search", "4x-slow-cpu"];

/// Persisted log shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One timing object per line
    #[default]
    Lines,
    /// A single array of pre-averaged timings
    Averaged,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Lines => write!(f, "lines"),
            LogFormat::Averaged => write!(f, "averaged"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lines" => Ok(LogFormat::Lines),
            "averaged" => Ok(LogFormat::Averaged),
            other => Err(Error::UnknownLogFormat(other.to_string())),
        }
    }
}

/// Filtering applied while reading
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub record_marker: String,
    pub exclude_markers: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            record_marker: DEFAULT_RECORD_MARKER.to_string(),
            exclude_markers: DEFAULT_EXCLUDE_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ReaderOptions {
    fn is_excluded(&self, name: &str) -> bool {
        self.exclude_markers.iter().any(|m| !m.is_empty() && name.contains(m.as_str()))
    }

    fn screen_name(&self, name: &str) -> Option<SkipReason> {
        if self.is_excluded(name) {
            Some(SkipReason::Excluded)
        } else if TimingSampleName::decode(name).is_err() {
            Some(SkipReason::MalformedName)
        } else {
            None
        }
    }
}

/// Lazy iterator over log entries
pub type Entries<'a> = Box<dyn Iterator<Item = Result<LogEntry>> + 'a>;

/// Source of timing entries
pub trait LogReader {
    fn format(&self) -> LogFormat;

    fn path(&self) -> &Path;

    /// Open the source and iterate over its entries
    fn entries(&self) -> Result<Entries<'_>>;
}

/// Reader for the one-object-per-line format
pub struct LineDelimitedReader {
    path: PathBuf,
    options: ReaderOptions,
}

impl LineDelimitedReader {
    pub fn new(path: impl Into<PathBuf>, options: ReaderOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    fn parse_line(&self, line_no: usize, line: &str) -> LogEntry {
        let skipped = |reason| LogEntry::Skipped { line: line_no, reason };

        if !line.contains(self.options.record_marker.as_str()) {
            return skipped(SkipReason::NoMarker);
        }

        let record: TimingRecord = match serde_json::from_str(line.trim()) {
            Ok(record) => record,
            Err(e) => {
                debug!("line {}: not a timing record: {}", line_no, e);
                return skipped(SkipReason::InvalidJson);
            }
        };

        if let Some(reason) = self.options.screen_name(&record.name) {
            return skipped(reason);
        }

        if !record.duration.is_finite() || record.duration < 0.0 {
            return skipped(SkipReason::InvalidDuration);
        }

        LogEntry::Sample(record)
    }
}

impl LogReader for LineDelimitedReader {
    fn format(&self) -> LogFormat {
        LogFormat::Lines
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> Result<Entries<'_>> {
        let file = File::open(&self.path)
            .map_err(|e| Error::from(e).at_stage(PipelineStage::Read, &self.path))?;

        let entries = BufReader::new(file).split(b'\n').enumerate().map(move |(idx, line)| -> Result<LogEntry> {
            let mut bytes = line.map_err(|e| Error::from(e).at_stage(PipelineStage::Read, &self.path))?;
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            match String::from_utf8(bytes) {
                Ok(line) => Ok(self.parse_line(idx + 1, &line)),
                Err(e) => {
                    debug!("line {}: not valid UTF-8: {}", idx + 1, e);
                    Ok(LogEntry::Skipped {
                        line: idx + 1,
                        reason: SkipReason::InvalidJson,
                    })
                }
            }
        });

        Ok(Box::new(entries))
    }
}

/// Reader for the single-array, pre-averaged format
pub struct PreAveragedReader {
    path: PathBuf,
    options: ReaderOptions,
}

impl PreAveragedReader {
    pub fn new(path: impl Into<PathBuf>, options: ReaderOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

impl LogReader for PreAveragedReader {
    fn format(&self) -> LogFormat {
        LogFormat::Averaged
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> Result<Entries<'_>> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::from(e).at_stage(PipelineStage::Read, &self.path))?;

        let timings: Vec<AveragedTiming> = serde_json::from_str(&content)
            .map_err(|e| Error::from(e).at_stage(PipelineStage::Parse, &self.path))?;

        let entries = timings.into_iter().enumerate().map(move |(idx, timing)| -> Result<LogEntry> {
            // Array position stands in for the line number
            let position = idx + 1;
            if let Some(reason) = self.options.screen_name(&timing.name) {
                return Ok(LogEntry::Skipped { line: position, reason });
            }
            if !timing.avg_time.is_finite() || timing.avg_time < 0.0 {
                return Ok(LogEntry::Skipped {
                    line: position,
                    reason: SkipReason::InvalidDuration,
                });
            }
            Ok(LogEntry::Averaged(timing))
        });

        Ok(Box::new(entries))
    }
}

/// Build the reader for a configured format
pub fn open(format: LogFormat, path: impl Into<PathBuf>, options: ReaderOptions) -> Box<dyn LogReader> {
    match format {
        LogFormat::Lines => Box::new(LineDelimitedReader::new(path, options)),
        LogFormat::Averaged => Box::new(PreAveragedReader::new(path, options)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_log(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn collect(reader: &dyn LogReader) -> Vec<LogEntry> {
        reader.entries().unwrap().map(|e| e.unwrap()).collect()
    }

    #[test]
    fn lines_skip_noise_bad_json_and_excluded() {
        let log = write_log(concat!(
            "Running 58 tests using 4 workers\n",
            "{\"name\":\"scix.citations.normal.TTRL\",\"duration\":412.5,\"startTime\":0}\n",
            "{\"name\": broken\n",
            "{\"name\":\"scix.test-search.normal.TTRL\",\"duration\":10}\n",
            "{\"name\":\"bbb.citations.4x-slow-cpu.TTRL\",\"duration\":10}\n",
            "{\"name\":\"bbb.v1.2.normal.TTRL\",\"duration\":10}\n",
            "{\"name\":\"bbb.citations.normal.TTRS\",\"duration\":-3}\n",
            "{\"name\":\"bbb.citations.normal.TTRS\",\"duration\":210}\n",
        ));
        let reader = LineDelimitedReader::new(log.path(), ReaderOptions::default());
        let entries = collect(&reader);

        let reasons: Vec<_> = entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Skipped { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::NoMarker,
                SkipReason::InvalidJson,
                SkipReason::Excluded,
                SkipReason::Excluded,
                SkipReason::MalformedName,
                SkipReason::InvalidDuration,
            ]
        );

        let samples: Vec<_> = entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Sample(r) => Some(r.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].duration, 412.5);
        assert_eq!(samples[0].start_time, Some(0.0));
        assert_eq!(samples[1].name, "bbb.citations.normal.TTRS");
    }

    #[test]
    fn lines_with_invalid_utf8_are_skipped_not_fatal() {
        let mut log = NamedTempFile::new().unwrap();
        log.write_all(b"{\"name\":\"scix.citations.normal.TTRL\",\"duration\":400}\n").unwrap();
        log.write_all(b"console noise \xff\xfe garbage\r\n").unwrap();
        log.write_all(b"{\"name\":\"scix.citations.normal.TTRL\",\"duration\":600}\r\n").unwrap();
        log.flush().unwrap();

        let reader = LineDelimitedReader::new(log.path(), ReaderOptions::default());
        let entries = collect(&reader);

        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[1],
            LogEntry::Skipped {
                line: 2,
                reason: SkipReason::InvalidJson
            }
        );
        assert!(matches!(&entries[2], LogEntry::Sample(r) if r.duration == 600.0));
    }

    #[test]
    fn lines_reader_is_restartable() {
        let log = write_log("{\"name\":\"scix.citations.normal.TTRL\",\"duration\":1}\n");
        let reader = LineDelimitedReader::new(log.path(), ReaderOptions::default());
        assert_eq!(collect(&reader).len(), 1);
        assert_eq!(collect(&reader).len(), 1);
    }

    #[test]
    fn missing_file_is_a_read_failure() {
        let reader = LineDelimitedReader::new("/nonexistent/performance-log.txt", ReaderOptions::default());
        let err = reader.entries().err().unwrap();
        assert_eq!(err.stage(), Some(PipelineStage::Read));
    }

    #[test]
    fn averaged_reader_passes_means_through() {
        let log = write_log(
            r#"[{"name":"scix.citations.normal.TTRL","avgTime":480.25},{"name":"broken","avgTime":1}]"#,
        );
        let reader = PreAveragedReader::new(log.path(), ReaderOptions::default());
        let entries = collect(&reader);
        assert_eq!(
            entries[0],
            LogEntry::Averaged(AveragedTiming {
                name: "scix.citations.normal.TTRL".to_string(),
                avg_time: 480.25,
            })
        );
        assert!(matches!(
            entries[1],
            LogEntry::Skipped { line: 2, reason: SkipReason::MalformedName }
        ));
    }

    #[test]
    fn averaged_reader_rejects_non_array() {
        let log = write_log("{\"name\":\"scix.citations.normal.TTRL\",\"duration\":1}\n");
        let reader = PreAveragedReader::new(log.path(), ReaderOptions::default());
        let err = reader.entries().err().unwrap();
        assert_eq!(err.stage(), Some(PipelineStage::Parse));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("lines".parse::<LogFormat>().unwrap(), LogFormat::Lines);
        assert_eq!("averaged".parse::<LogFormat>().unwrap(), LogFormat::Averaged);
        assert!("csv".parse::<LogFormat>().is_err());
        assert_eq!(open(LogFormat::Averaged, "x.json", ReaderOptions::default()).format(), LogFormat::Averaged);
    }
}
