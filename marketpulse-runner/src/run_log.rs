//! The per-run event aggregate.
//!
//! One [`RunLog`] is created per run and handed to every component as a
//! `&dyn EventSink`. It keeps every record for the reports and echoes each
//! one to the console as it arrives.

use chrono::{DateTime, Local};
use marketpulse_core::sink::{ConsoleSink, EventExtra, EventSink, EventStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: String,
    pub status: EventStatus,
    pub details: String,
    pub chart_path: Option<PathBuf>,
    pub timestamp: DateTime<Local>,
}

/// Serializable view of a run, written as `execution_report.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
    pub tasks: Vec<TaskRecord>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub charts: Vec<PathBuf>,
    /// (category, one-line reading) in the order produced.
    pub insights: Vec<(String, String)>,
    pub market_signals: BTreeMap<String, String>,
    pub duration_secs: Option<f64>,
}

impl ExecutionReport {
    pub fn count(&self, status: EventStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn insight(&self, category: &str) -> Option<&str> {
        self.insights
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, text)| text.as_str())
    }
}

pub struct RunLog {
    state: Mutex<ExecutionReport>,
    started: Instant,
    echo: bool,
}

impl RunLog {
    /// A log that echoes every record to stdout.
    pub fn new() -> Self {
        Self::with_echo(true)
    }

    /// A log that only aggregates.
    pub fn quiet() -> Self {
        Self::with_echo(false)
    }

    fn with_echo(echo: bool) -> Self {
        let report = ExecutionReport {
            start_time: Some(Local::now()),
            ..ExecutionReport::default()
        };
        Self {
            state: Mutex::new(report),
            started: Instant::now(),
            echo,
        }
    }

    // A panicking task must not take the log down with it.
    fn state(&self) -> MutexGuard<'_, ExecutionReport> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_insight(&self, category: &str, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(category, insight = %text, "insight");
        self.state().insights.push((category.to_string(), text));
    }

    pub fn set_signal(&self, key: &str, value: impl Into<String>) {
        self.state().market_signals.insert(key.to_string(), value.into());
    }

    /// Stamp the end time and duration.
    pub fn finish(&self) {
        let mut state = self.state();
        state.end_time = Some(Local::now());
        state.duration_secs = Some(self.started.elapsed().as_secs_f64());
    }

    pub fn snapshot(&self) -> ExecutionReport {
        self.state().clone()
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RunLog {
    fn record(&self, category: &str, status: EventStatus, message: &str, extra: EventExtra) {
        if self.echo {
            ConsoleSink.record(category, status, message, extra.clone());
        }
        let mut state = self.state();
        match status {
            EventStatus::Error => state.errors.push(message.to_string()),
            EventStatus::Warning => state.warnings.push(message.to_string()),
            EventStatus::Info | EventStatus::Success => {}
        }
        if let Some(path) = &extra.chart_path {
            state.charts.push(path.clone());
        }
        state.tasks.push(TaskRecord {
            task: category.to_string(),
            status,
            details: message.to_string(),
            chart_path: extra.chart_path,
            timestamp: Local::now(),
        });
    }
}
