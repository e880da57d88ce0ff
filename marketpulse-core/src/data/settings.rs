//! Fetch-layer settings: cache location and freshness, request timeouts,
//! provider endpoints and the roster.

use super::roster::Roster;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Settings for the `[fetch]` table. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub cache_dir: PathBuf,
    /// A cache record younger than this is reused without any network call.
    pub freshness_secs: u64,
    /// Rows kept per series after unification.
    pub history_window: usize,
    pub request_timeout_secs: u64,
    /// How far back the date-ranged requests reach.
    pub lookback_days: i64,
    pub user_agent: String,
    pub yahoo_base_url: String,
    /// Base URL of the AKTools HTTP wrapper serving the macro datasets.
    pub macro_api_base_url: String,
    pub fx_table_url: String,
    pub roster: Roster,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("output/data_cache"),
            freshness_secs: 24 * 3600,
            history_window: 300,
            request_timeout_secs: 30,
            lookback_days: 3 * 365,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            yahoo_base_url: "https://query2.finance.yahoo.com".to_string(),
            macro_api_base_url: "http://127.0.0.1:8080".to_string(),
            fx_table_url: "https://www.safe.gov.cn/AppStructured/hlw/RMBQuery.do".to_string(),
            roster: Roster::default(),
        }
    }
}

impl FetchSettings {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
