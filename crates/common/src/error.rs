//! Error types for SearchPerf

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using SearchPerf Error
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of the offline aggregation pipeline that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Read,
    Parse,
    Aggregate,
    Write,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Read => write!(f, "read"),
            PipelineStage::Parse => write!(f, "parse"),
            PipelineStage::Aggregate => write!(f, "aggregate"),
            PipelineStage::Write => write!(f, "write"),
        }
    }
}

/// SearchPerf error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid sample name field {field}: {value:?} ({reason})")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Malformed sample name {raw:?}: expected 4 dot-separated tokens, found {tokens}")]
    Decode { raw: String, tokens: usize },

    #[error("Unknown throttle profile: {0}")]
    UnknownProfile(String),

    #[error("Unknown log format: {0} (expected 'lines' or 'averaged')")]
    UnknownLogFormat(String),

    #[error("No aggregate bucket for {0}")]
    MissingBucket(String),

    #[error("{stage} stage failed for {}: {source}", path.display())]
    Pipeline {
        stage: PipelineStage,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wrap this error with the pipeline stage and file it belongs to
    pub fn at_stage(self, stage: PipelineStage, path: impl Into<PathBuf>) -> Self {
        Error::Pipeline {
            stage,
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// The pipeline stage, if this error was raised by the aggregation pipeline
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Error::Pipeline { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
