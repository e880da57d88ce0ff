//! Headline counts for the report header.

use crate::run_log::ExecutionReport;
use marketpulse_core::sink::EventStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub records: usize,
    pub successes: usize,
    pub warnings: usize,
    pub errors: usize,
    pub charts: usize,
    pub duration: String,
}

impl RunSummary {
    pub fn from_report(report: &ExecutionReport) -> Self {
        Self {
            records: report.tasks.len(),
            successes: report.count(EventStatus::Success),
            warnings: report.warnings.len(),
            errors: report.errors.len(),
            charts: report.charts.len(),
            duration: report
                .duration_secs
                .map_or_else(|| "N/A".to_string(), |s| format!("{s:.2}s")),
        }
    }

    pub fn status_line(&self) -> &'static str {
        if self.errors == 0 {
            "✅ All tasks succeeded"
        } else {
            "⚠️ Partial failure"
        }
    }
}
