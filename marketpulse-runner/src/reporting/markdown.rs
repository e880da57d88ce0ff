//! Markdown market report.

use super::RunSummary;
use crate::run_log::ExecutionReport;
use crate::tasks::insight;
use std::fmt::Write;

pub fn render_markdown(report: &ExecutionReport) -> String {
    let summary = RunSummary::from_report(report);
    let generated = report
        .end_time
        .unwrap_or_else(chrono::Local::now)
        .format("%Y-%m-%d %H:%M:%S");

    let mut md = format!(
        "# 📊 Daily Market Report\n\n\
**Generated**: {generated}  \n\
**Sources**: Yahoo Finance, AKTools, SAFE  \n\
**Window**: rolling 3 months  \n\
**Status**: {}\n\n\
---\n\n\
## 🎯 Summary\n\n\
- **Records**: {}\n\
- **Succeeded**: {}\n\
- **Warnings**: {}\n\
- **Errors**: {}\n\
- **Charts**: {}\n\
- **Duration**: {}\n\n\
---\n\n\
## 💡 Market Insights\n",
        summary.status_line(),
        summary.records,
        summary.successes,
        summary.warnings,
        summary.errors,
        summary.charts,
        summary.duration,
    );

    for (i, category) in insight::ALL.iter().enumerate() {
        let _ = write!(md, "\n### {}. {category}\n", i + 1);
        match report.insight(category) {
            Some(text) => {
                let _ = writeln!(md, "- {text}");
            }
            None => md.push_str("- No data\n"),
        }
    }

    if !report.market_signals.is_empty() {
        md.push_str("\n## 🚦 Market Signals\n\n| Signal | Value |\n|--------|-------|\n");
        for (key, value) in &report.market_signals {
            let _ = writeln!(md, "| {key} | {value} |");
        }
    }

    md.push_str("\n---\n\n## 📈 Charts\n\n");
    if report.charts.is_empty() {
        md.push_str("No charts were generated.\n");
    }
    for path in &report.charts {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let _ = writeln!(md, "![{name}]({name})");
    }

    if !report.warnings.is_empty() {
        md.push_str("\n## ⚠️ Warnings\n\n");
        for w in &report.warnings {
            let _ = writeln!(md, "- {w}");
        }
    }
    if !report.errors.is_empty() {
        md.push_str("\n## ❌ Errors\n\n");
        for e in &report.errors {
            let _ = writeln!(md, "- {e}");
        }
    }
    md
}
