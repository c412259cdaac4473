//! SearchPerf CLI
//!
//! Command-line interface for collecting search timings in real browsers and
//! aggregating timing logs into the CSV report.

pub mod commands;
pub mod config;
pub mod output;
