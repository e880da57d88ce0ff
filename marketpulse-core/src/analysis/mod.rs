//! Market analysis over the series bundle.
//!
//! The analyzer is read-only: it borrows the bundle and the thresholds and
//! recomputes every derived indicator on demand.

pub mod analyzer;
pub mod error;
pub mod regime;
pub mod stats;

pub use analyzer::{
    ChinaUsLinkage, EquityBondSpread, IndexDivergence, Liquidity, MarginTrend, MarketAnalyzer,
    OilGoldRatio, RiskRegime, SectorRotation,
};
pub use error::AnalysisError;
pub use regime::Thresholds;
pub use stats::Trend;
