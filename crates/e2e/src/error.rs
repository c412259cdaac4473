//! Error types for timing collection

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Browser driver exited: {0}")]
    DriverExited(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Sample started twice: {0}")]
    DuplicateStart(String),

    #[error("Sample ended without a start: {0}")]
    UnmatchedEnd(String),

    #[error("Samples started but never ended: {}", .0.join(", "))]
    UnmatchedStart(Vec<String>),

    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    #[error("Invalid runner configuration: {0}")]
    Config(String),

    #[error("Query catalog error: {0}")]
    Catalog(String),

    #[error(transparent)]
    Common(#[from] searchperf_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
