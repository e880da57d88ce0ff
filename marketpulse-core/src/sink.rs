//! Run event sink.
//!
//! Components report user-visible progress through an [`EventSink`] passed in
//! by the caller. The caller owns whatever aggregate sits behind it (the run
//! log in the runner, plain stdout in the CLI `fetch` command).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome class of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Info,
    Success,
    Warning,
    Error,
}

impl EventStatus {
    /// Console glyph for this status.
    pub fn glyph(self) -> &'static str {
        match self {
            EventStatus::Info => "ℹ️ ",
            EventStatus::Success => "✅",
            EventStatus::Warning => "⚠️ ",
            EventStatus::Error => "❌",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStatus::Info => "info",
            EventStatus::Success => "success",
            EventStatus::Warning => "warning",
            EventStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Optional attachments on an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventExtra {
    pub chart_path: Option<PathBuf>,
}

impl EventExtra {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn chart(path: impl Into<PathBuf>) -> Self {
        Self {
            chart_path: Some(path.into()),
        }
    }
}

/// Receiver for run events.
pub trait EventSink {
    fn record(&self, category: &str, status: EventStatus, message: &str, extra: EventExtra);

    fn info(&self, category: &str, message: &str) {
        self.record(category, EventStatus::Info, message, EventExtra::none());
    }

    fn success(&self, category: &str, message: &str) {
        self.record(category, EventStatus::Success, message, EventExtra::none());
    }

    fn warning(&self, category: &str, message: &str) {
        self.record(category, EventStatus::Warning, message, EventExtra::none());
    }

    fn error(&self, category: &str, message: &str) {
        self.record(category, EventStatus::Error, message, EventExtra::none());
    }
}

/// Prints each event as a glyph-prefixed line on stdout.
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn record(&self, category: &str, status: EventStatus, message: &str, extra: EventExtra) {
        match extra.chart_path {
            Some(path) => println!(
                "{} [{category}] {message} -> {}",
                status.glyph(),
                path.display()
            ),
            None => println!("{} [{category}] {message}", status.glyph()),
        }
    }
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _category: &str, _status: EventStatus, _message: &str, _extra: EventExtra) {}
}
