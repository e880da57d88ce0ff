//! The fixed set of symbols fetched on a full refresh.
//!
//! Symbol keys follow a naming convention that [`Route::for_symbol`] relies
//! on: `FX_<CCY>` for central-parity FX, `ETF_<code>` for exchange-listed fund
//! history, a handful of exact macro names, and plain tickers for everything
//! the generic time-series source serves.
//!
//! [`Route::for_symbol`]: super::provider::Route::for_symbol

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symbol keys shared between the fetcher and the analyzer.
pub mod symbols {
    pub const FX_PREFIX: &str = "FX_";
    pub const ETF_PREFIX: &str = "ETF_";

    pub const MARGIN_BALANCE: &str = "MARGIN_BALANCE";
    pub const SHIBOR_1M: &str = "SHIBOR_1M";
    pub const CN_US_SPREAD: &str = "CN_US_SPREAD";
    pub const US_BOND: &str = "US_BOND";
    pub const CN_BOND_10Y: &str = "CN_BOND_10Y";
    pub const SSE50_PE_TTM: &str = "SSE50_PE_TTM";
    pub const CRUDE_OIL: &str = "CL";
    pub const GOLD: &str = "GC";
    pub const FX_USD: &str = "FX_USD";

    pub const CSI300_ETF: &str = "ETF_510300";
    pub const CSI500_ETF: &str = "ETF_510500";
    pub const CSI1000_ETF: &str = "ETF_159845";

    pub const US_10Y_YIELD: &str = "^TNX";
    pub const VIX: &str = "^VIX";
    pub const SP500: &str = "^GSPC";
    pub const NASDAQ: &str = "^IXIC";
    pub const RUSSELL_2000: &str = "^RUT";
    pub const REIT_ETF: &str = "VNQ";
    pub const NIKKEI_225: &str = "^N225";
    pub const HANG_SENG: &str = "^HSI";
    pub const USD_CNY: &str = "CNY=X";
}

/// Symbols fetched by `fetch_all`, grouped the way the reports present them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    /// China-side macro series and the commodity futures.
    pub macro_series: Vec<String>,
    /// Global index, rate, volatility and FX tickers.
    pub indices: Vec<String>,
    /// Sector label → ETF ticker.
    pub sector_etfs: BTreeMap<String, String>,
}

impl Default for Roster {
    fn default() -> Self {
        use symbols::*;
        let macro_series = [
            MARGIN_BALANCE,
            SHIBOR_1M,
            CN_US_SPREAD,
            US_BOND,
            CN_BOND_10Y,
            CSI300_ETF,
            CSI1000_ETF,
            CSI500_ETF,
            CRUDE_OIL,
            GOLD,
            SSE50_PE_TTM,
            FX_USD,
        ];
        let indices = [
            US_10Y_YIELD,
            VIX,
            SP500,
            NASDAQ,
            RUSSELL_2000,
            REIT_ETF,
            NIKKEI_225,
            HANG_SENG,
            USD_CNY,
        ];
        let sector_etfs = [
            ("US Tech", "QQQ"),
            ("US Financials", "XLF"),
            ("US Healthcare", "XLV"),
            ("US Consumer", "XLY"),
            ("US Energy", "XLE"),
            ("US Industrials", "XLI"),
        ];
        Self {
            macro_series: macro_series.iter().map(|s| s.to_string()).collect(),
            indices: indices.iter().map(|s| s.to_string()).collect(),
            sector_etfs: sector_etfs
                .iter()
                .map(|(label, ticker)| (label.to_string(), ticker.to_string()))
                .collect(),
        }
    }
}

impl Roster {
    /// Every symbol key in fetch order, without duplicates.
    pub fn symbols(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.macro_series
            .iter()
            .chain(&self.indices)
            .chain(self.sector_etfs.values())
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.symbols().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
