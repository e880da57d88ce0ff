//! Report writers: `execution_report.json` and `market_report.md`.

mod markdown;
mod summary;

pub use markdown::render_markdown;
pub use summary::RunSummary;

use crate::run_log::ExecutionReport;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const JSON_REPORT: &str = "execution_report.json";
pub const MARKDOWN_REPORT: &str = "market_report.md";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn write_all(&self, report: &ExecutionReport) -> Result<ReportPaths> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output dir {}", self.output_dir.display())
        })?;
        Ok(ReportPaths {
            json: self.write_json(report)?,
            markdown: self.write_markdown(report)?,
        })
    }

    pub fn write_json(&self, report: &ExecutionReport) -> Result<PathBuf> {
        let path = self.output_dir.join(JSON_REPORT);
        let json =
            serde_json::to_string_pretty(report).context("Failed to serialize execution report")?;
        write(&path, json)?;
        Ok(path)
    }

    pub fn write_markdown(&self, report: &ExecutionReport) -> Result<PathBuf> {
        let path = self.output_dir.join(MARKDOWN_REPORT);
        write(&path, render_markdown(report))?;
        Ok(path)
    }
}

fn write(path: &Path, content: String) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
