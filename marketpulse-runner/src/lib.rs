//! MarketPulse Runner: one daily run from configuration to reports.
//!
//! This crate builds on `marketpulse-core` to provide:
//! - TOML configuration with defaults for every table
//! - The run log, an `EventSink` that aggregates a run for the reports
//! - SVG line and bar charts
//! - The task scheduler and the cross-market reading
//! - JSON and Markdown reports

pub mod charts;
pub mod config;
pub mod pipeline;
pub mod reporting;
pub mod run_log;
pub mod tasks;

pub use charts::{ChartError, ChartGenerator};
pub use config::{ChartsConfig, IndexChart, MarketPulseConfig, OutputConfig};
pub use pipeline::{run, RunOutcome};
pub use reporting::{ReportGenerator, ReportPaths};
pub use run_log::{ExecutionReport, RunLog, TaskRecord};
pub use tasks::{TaskOutcome, TaskTally};
