//! TOML run configuration.
//!
//! Every table and field is optional; an empty file yields the production
//! defaults.

use anyhow::{Context, Result};
use marketpulse_core::analysis::Thresholds;
use marketpulse_core::data::FetchSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketPulseConfig {
    pub fetch: FetchSettings,
    pub thresholds: Thresholds,
    pub output: OutputConfig,
    pub charts: ChartsConfig,
}

impl MarketPulseConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse MarketPulse config")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load `path` when given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Symbols the tasks read beyond the fetch roster.
    pub fn extra_symbols(&self) -> Vec<String> {
        let roster = self.fetch.roster.symbols();
        let mut extra: Vec<String> = Vec::new();
        for ticker in self.charts.indices.iter().map(|c| &c.ticker) {
            if !roster.contains(ticker) && !extra.contains(ticker) {
                extra.push(ticker.clone());
            }
        }
        extra
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Charts and reports land here.
    pub output_dir: PathBuf,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            chart_width: 1200,
            chart_height: 700,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub indices: Vec<IndexChart>,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        let month = 21;
        let chart = |ticker: &str, title: &str, file: &str, points: usize| IndexChart {
            ticker: ticker.to_string(),
            title: title.to_string(),
            file: file.to_string(),
            points,
        };
        Self {
            indices: vec![
                chart("^TNX", "US 10Y Treasury Yield", "tenbond.svg", month),
                chart("^VIX", "VIX", "vix.svg", 2 * month),
                chart("^GSPC", "S&P 500", "sp500.svg", month),
                chart("^IXIC", "Nasdaq Composite", "nasdaq.svg", month),
                chart("^RUT", "Russell 2000", "rs2000.svg", month),
                chart("VNQ", "US REITs (VNQ)", "vnq.svg", month),
                chart("^N225", "Nikkei 225", "nikkei225.svg", month),
                chart("^HSI", "Hang Seng", "hsi.svg", month),
                chart("CNY=X", "USD/CNY", "rmb.svg", month),
            ],
        }
    }
}

/// One `[[charts.indices]]` entry: the last `points` closes of `ticker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChart {
    pub ticker: String,
    #[serde(default)]
    pub title: String,
    pub file: String,
    #[serde(default = "default_points")]
    pub points: usize,
}

fn default_points() -> usize {
    21
}

impl IndexChart {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.ticker
        } else {
            &self.title
        }
    }
}
