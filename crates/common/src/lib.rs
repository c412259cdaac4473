//! SearchPerf Common Library
//!
//! Sample naming, throttle profiles and the offline half of the timing pipeline:
//! reading timing logs, aggregating them and writing the pivoted CSV report.

pub mod aggregator;
pub mod error;
pub mod log_reader;
pub mod pivot;
pub mod record;
pub mod sample_name;
pub mod throttle;

// Re-export commonly used types
pub use aggregator::{aggregate, AggregateBucket, AggregationStats, Aggregator, AggregatorOptions};
pub use error::{Error, PipelineStage, Result};
pub use log_reader::{LineDelimitedReader, LogFormat, LogReader, PreAveragedReader, ReaderOptions};
pub use pivot::PivotTable;
pub use record::{AveragedTiming, LogEntry, SkipReason, TimingRecord};
pub use sample_name::{Phase, SamplePrefix, TimingSampleName};
pub use throttle::{ConnectionType, NetworkConditions, ThrottleProfile};

/// SearchPerf version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
