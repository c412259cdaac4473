//! Timing recorder
//!
//! `sample_start`/`sample_end` pairs keyed by encoded sample name. Any number of samples
//! may be open at once. A record is handed to the sink only when its end is seen, so a
//! scenario that dies halfway leaves nothing behind for the samples it never closed.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use searchperf_common::TimingRecord;
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

/// Append-only destination for completed records
pub trait TimingSink: Send + Sync {
    fn append(&self, record: &TimingRecord) -> E2eResult<()>;
}

/// Timing log with one JSON object per line
///
/// Each record goes out in a single `write_all` under the lock, so concurrent
/// scenarios never interleave partial lines.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn open(path: impl Into<PathBuf>) -> E2eResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TimingSink for JsonLinesSink {
    fn append(&self, record: &TimingRecord) -> E2eResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

/// In-memory sink, handy for inspecting what a scenario recorded
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<TimingRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TimingRecord> {
        self.records.lock().clone()
    }

    pub fn find(&self, name: &str) -> Option<TimingRecord> {
        self.records.lock().iter().find(|r| r.name == name).cloned()
    }
}

impl TimingSink for MemorySink {
    fn append(&self, record: &TimingRecord) -> E2eResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Per-scenario recorder
///
/// Offsets in emitted records are measured from the moment the recorder was created.
pub struct TimingRecorder {
    sink: Arc<dyn TimingSink>,
    origin: Instant,
    open: HashMap<String, Instant>,
    recorded: usize,
}

impl TimingRecorder {
    pub fn new(sink: Arc<dyn TimingSink>) -> Self {
        Self {
            sink,
            origin: Instant::now(),
            open: HashMap::new(),
            recorded: 0,
        }
    }

    pub fn sample_start(&mut self, name: &str) -> E2eResult<()> {
        self.start_at(name, Instant::now())
    }

    /// Open several samples at the same instant
    pub fn sample_start_all(&mut self, names: &[&str]) -> E2eResult<()> {
        let now = Instant::now();
        for name in names {
            self.start_at(name, now)?;
        }
        Ok(())
    }

    fn start_at(&mut self, name: &str, at: Instant) -> E2eResult<()> {
        if self.open.contains_key(name) {
            return Err(E2eError::DuplicateStart(name.to_string()));
        }
        debug!("sampleStart {}", name);
        self.open.insert(name.to_string(), at);
        Ok(())
    }

    /// Close a sample and persist it
    pub fn sample_end(&mut self, name: &str) -> E2eResult<TimingRecord> {
        self.end_at(name, Instant::now())
    }

    /// Close several samples at the same instant
    pub fn sample_end_all(&mut self, names: &[&str]) -> E2eResult<Vec<TimingRecord>> {
        let now = Instant::now();
        names.iter().map(|name| self.end_at(name, now)).collect()
    }

    fn end_at(&mut self, name: &str, at: Instant) -> E2eResult<TimingRecord> {
        let started = self
            .open
            .remove(name)
            .ok_or_else(|| E2eError::UnmatchedEnd(name.to_string()))?;

        let record = TimingRecord {
            name: name.to_string(),
            duration: millis(at.duration_since(started)),
            start_time: Some(millis(started.duration_since(self.origin))),
            end_time: Some(millis(at.duration_since(self.origin))),
        };
        self.sink.append(&record)?;
        self.recorded += 1;
        debug!("sampleEnd {} ({:.1} ms)", name, record.duration);
        Ok(record)
    }

    /// Names of samples started but not yet ended, sorted
    pub fn open_samples(&self) -> Vec<String> {
        let mut names: Vec<String> = self.open.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of records persisted so far
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Verify every started sample was ended
    pub fn finish(&mut self) -> E2eResult<()> {
        let open = self.abandon();
        if open.is_empty() {
            Ok(())
        } else {
            Err(E2eError::UnmatchedStart(open))
        }
    }

    /// Drop all open samples without persisting them
    pub fn abandon(&mut self) -> Vec<String> {
        let names = self.open_samples();
        if !names.is_empty() {
            warn!("Discarding incomplete samples: {}", names.join(", "));
        }
        self.open.clear();
        names
    }
}

fn millis(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
