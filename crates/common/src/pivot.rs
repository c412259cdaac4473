//! Wide CSV report
//!
//! One row per test name. For every observed throttle profile the report carries one
//! column per (application, phase) and one run-count column per application:
//!
//! ```text
//! testName,scix_normal_TTRL,...,bbb_normal_TTRR,scix_normal_runCount,bbb_normal_runCount,scix_eth-2x_TTRL,...
//! ```
//!
//! Cells with nothing measured are left empty, never written as `0`.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::error::{Error, PipelineStage, Result};
use crate::sample_name::{Phase, TimingSampleName};

/// Header of the row-key column
pub const ROW_KEY_COLUMN: &str = "testName";

/// Header for one timing column
pub fn phase_column(application: &str, throttle_profile: &str, phase: Phase) -> String {
    format!("{}_{}_{}", application, throttle_profile, phase)
}

/// Header for one run-count column
pub fn run_count_column(application: &str, throttle_profile: &str) -> String {
    format!("{}_{}_runCount", application, throttle_profile)
}

/// A report column and what fills it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    TestName,
    Timing {
        application: String,
        throttle_profile: String,
        phase: Phase,
    },
    RunCount {
        application: String,
        throttle_profile: String,
    },
}

impl Column {
    pub fn header(&self) -> String {
        match self {
            Column::TestName => ROW_KEY_COLUMN.to_string(),
            Column::Timing {
                application,
                throttle_profile,
                phase,
            } => phase_column(application, throttle_profile, *phase),
            Column::RunCount {
                application,
                throttle_profile,
            } => run_count_column(application, throttle_profile),
        }
    }

    fn cell(&self, aggregator: &Aggregator, test_name: &str) -> Option<String> {
        match self {
            Column::TestName => Some(test_name.to_string()),
            Column::Timing {
                application,
                throttle_profile,
                phase,
            } => {
                let key = TimingSampleName {
                    application: application.clone(),
                    test_name: test_name.to_string(),
                    throttle_profile: throttle_profile.clone(),
                    phase: phase.as_str().to_string(),
                };
                aggregator.bucket(&key).map(|b| format_number(b.mean()))
            }
            Column::RunCount {
                application,
                throttle_profile,
            } => aggregator
                .run_count(test_name, throttle_profile, application)
                .map(|n| n.to_string()),
        }
    }
}

fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// Rectangular pivot of an aggregator's means and run counts
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Option<String>>>,
}

impl PivotTable {
    /// Lay out columns from the observed profiles and applications, then fill rows
    pub fn build(aggregator: &Aggregator) -> Self {
        let applications = aggregator.applications();
        let mut columns = vec![Column::TestName];

        for profile in aggregator.throttle_profiles() {
            for application in &applications {
                for phase in Phase::ALL {
                    columns.push(Column::Timing {
                        application: application.clone(),
                        throttle_profile: profile.clone(),
                        phase,
                    });
                }
            }
            for application in &applications {
                columns.push(Column::RunCount {
                    application: application.clone(),
                    throttle_profile: profile.clone(),
                });
            }
        }

        let rows = aggregator
            .test_names()
            .iter()
            .map(|test| columns.iter().map(|c| c.cell(aggregator, test)).collect())
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(Column::header).collect()
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Look up one cell by test name and column header
    pub fn cell(&self, test_name: &str, header: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c.header() == header)?;
        self.rows
            .iter()
            .find(|row| row.first().and_then(|c| c.as_deref()) == Some(test_name))
            .and_then(|row| row[col].as_deref())
    }

    /// Render as CSV text with a header row
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let headers: Vec<String> = self.headers().iter().map(|h| csv_escape(h)).collect();
        out.push_str(&headers.join(","));
        out.push('\n');

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|c| c.as_deref().map(csv_escape).unwrap_or_default())
                .collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    /// Write the report, replacing `path` only once the whole file is on disk
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_csv().as_bytes())
            .map_err(|e| Error::from(e).at_stage(PipelineStage::Write, path))?;
        info!(
            "Wrote {} rows x {} columns to {}",
            self.rows.len(),
            self.columns.len(),
            path.display()
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file_mut().sync_all()?;
    temp.into_temp_path().persist(path).map_err(|e| e.error)
}

/// Quote a field when it holds a comma, quote or newline
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
