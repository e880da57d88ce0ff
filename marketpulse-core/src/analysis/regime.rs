//! Regime classifiers: deterministic threshold ladders from scalars to labels.
//!
//! Every band is a field of [`Thresholds`], loaded from the `[thresholds]`
//! config table. The ladders check from the most extreme band inward, so the
//! first matching rung wins.

use serde::{Deserialize, Serialize};

/// Band edges for every classifier. Defaults match the production settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum points for index-level analyses.
    pub min_points: usize,
    /// Points in the "3 month" analysis window.
    pub analysis_window: usize,
    /// Points in the "1 month" sector window.
    pub sector_window: usize,
    /// Lookback, in points, for the 30-day returns.
    pub return_lookback: usize,
    pub trend_period: usize,
    pub volatility_window: usize,

    pub vix_extreme: f64,
    pub vix_high: f64,
    pub vix_low: f64,

    pub bond_extreme_high: f64,
    pub bond_high: f64,
    pub bond_low: f64,
    pub bond_extreme_low: f64,
    /// Yield bands used by the composite risk score.
    pub risk_bond_high: f64,
    pub risk_bond_low: f64,
    pub stock_bond_corr: f64,

    /// Band for the style "broad move" check, in return percentage points.
    pub style_band: f64,
    pub small_cap_vol_ratio: f64,
    pub size_corr_floor: f64,

    pub cny_move_pct: f64,
    pub linkage_strong: f64,
    pub linkage_weak: f64,
    pub relative_strength_pct: f64,
    pub fx_divergence_corr: f64,

    pub margin_min_points: usize,
    pub shibor_min_points: usize,
    pub margin_fast_pct: f64,
    pub margin_trend_pct: f64,
    pub margin_score_pct: f64,
    pub shibor_high: f64,
    pub shibor_low: f64,
    pub shibor_loose: f64,
    pub spread_wide: f64,
    pub spread_narrow: f64,

    pub sector_min_points: usize,
    pub dispersion_violent: f64,
    pub dispersion_mild: f64,

    /// Percentile bands for the equity-bond spread label.
    pub erp_cheap_percentile: f64,
    pub erp_rich_percentile: f64,
    pub commodity_min_points: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_points: 30,
            analysis_window: 63,
            sector_window: 21,
            return_lookback: 30,
            trend_period: 10,
            volatility_window: 20,

            vix_extreme: 35.0,
            vix_high: 25.0,
            vix_low: 15.0,

            bond_extreme_high: 5.0,
            bond_high: 4.0,
            bond_low: 3.5,
            bond_extreme_low: 2.5,
            risk_bond_high: 4.5,
            risk_bond_low: 3.0,
            stock_bond_corr: 0.3,

            style_band: 2.0,
            small_cap_vol_ratio: 1.2,
            size_corr_floor: 0.6,

            cny_move_pct: 0.5,
            linkage_strong: 0.7,
            linkage_weak: 0.3,
            relative_strength_pct: 5.0,
            fx_divergence_corr: -0.2,

            margin_min_points: 50,
            shibor_min_points: 30,
            margin_fast_pct: 2.0,
            margin_trend_pct: 5.0,
            margin_score_pct: 1.0,
            shibor_high: 3.0,
            shibor_low: 2.0,
            shibor_loose: 2.5,
            spread_wide: 50.0,
            spread_narrow: 0.0,

            sector_min_points: 10,
            dispersion_violent: 8.0,
            dispersion_mild: 3.0,

            erp_cheap_percentile: 80.0,
            erp_rich_percentile: 20.0,
            commodity_min_points: 50,
        }
    }
}

/// Implements `label()` and `describe()` for a classifier enum.
macro_rules! labelled {
    ($ty:ident { $($variant:ident => ($label:expr, $desc:expr)),+ $(,)? }) => {
        impl $ty {
            pub fn label(self) -> &'static str {
                match self {
                    $($ty::$variant => $label,)+
                }
            }

            pub fn describe(self) -> &'static str {
                match self {
                    $($ty::$variant => $desc,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStyle {
    Growth,
    Value,
    BroadMove,
    RiskOff,
    Rotation,
}

labelled!(MarketStyle {
    Growth => ("Growth", "Tech leads, large caps follow, small caps lag: risk appetite chasing growth"),
    Value => ("Value", "Small caps lead, tech lags: recovery or inflation trade"),
    BroadMove => ("Broad move", "Indices move together with no clear style: liquidity or systemic driver"),
    RiskOff => ("Risk-off", "Broad decline: watch VIX and safe-haven assets"),
    Rotation => ("Rotation", "Style rotation and dispersion: look for sector and stock opportunities"),
});

/// Style from the 30-day returns of Nasdaq, S&P 500 and Russell 2000.
pub fn classify_style(nasdaq: f64, sp500: f64, russell: f64, t: &Thresholds) -> MarketStyle {
    if nasdaq > sp500 && sp500 > russell {
        MarketStyle::Growth
    } else if russell > sp500 && sp500 > nasdaq {
        MarketStyle::Value
    } else if (nasdaq - sp500).abs() < t.style_band && (sp500 - russell).abs() < t.style_band {
        MarketStyle::BroadMove
    } else if nasdaq < 0.0 && sp500 < 0.0 && russell < 0.0 {
        MarketStyle::RiskOff
    } else {
        MarketStyle::Rotation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VixLevel {
    Extreme,
    High,
    Normal,
    Low,
}

labelled!(VixLevel {
    Extreme => ("extreme", "Panic extreme, markets in full risk-off"),
    High => ("high", "Fear rising, risk appetite falling"),
    Normal => ("normal", "Normal volatility range"),
    Low => ("low", "Complacency, markets overly optimistic"),
});

pub fn classify_vix(vix: f64, t: &Thresholds) -> VixLevel {
    if vix > t.vix_extreme {
        VixLevel::Extreme
    } else if vix > t.vix_high {
        VixLevel::High
    } else if vix < t.vix_low {
        VixLevel::Low
    } else {
        VixLevel::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondLevel {
    ExtremeHigh,
    High,
    Normal,
    Low,
    ExtremeLow,
}

labelled!(BondLevel {
    ExtremeHigh => ("extreme_high", "Very high rates, heavy pressure on valuations"),
    High => ("high", "High rates, unfavourable for long-duration assets"),
    Normal => ("normal", "Neutral rate zone"),
    Low => ("low", "Low rates, supportive of growth stocks"),
    ExtremeLow => ("extreme_low", "Very low rates, valuations at bubble risk"),
});

pub fn classify_bond(yield_pct: f64, t: &Thresholds) -> BondLevel {
    if yield_pct > t.bond_extreme_high {
        BondLevel::ExtremeHigh
    } else if yield_pct > t.bond_high {
        BondLevel::High
    } else if yield_pct < t.bond_extreme_low {
        BondLevel::ExtremeLow
    } else if yield_pct < t.bond_low {
        BondLevel::Low
    } else {
        BondLevel::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationRegime {
    Positive,
    Negative,
    Weak,
}

labelled!(CorrelationRegime {
    Positive => ("positive", "Stocks and bonds move together: diversification failing, macro-driven"),
    Negative => ("negative", "Stocks and bonds offset: diversification working"),
    Weak => ("weak", "Independent drivers"),
});

pub fn classify_stock_bond(corr: f64, t: &Thresholds) -> CorrelationRegime {
    if corr > t.stock_bond_corr {
        CorrelationRegime::Positive
    } else if corr < -t.stock_bond_corr {
        CorrelationRegime::Negative
    } else {
        CorrelationRegime::Weak
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Moderate,
    Low,
}

labelled!(RiskLevel {
    High => ("High risk", "Cut equity exposure, buy VIX calls, add cash or gold"),
    Medium => ("Medium risk", "Hold neutral exposure, hedge tail risk"),
    Moderate => ("Moderate risk", "Balanced allocation, adjust dynamically"),
    Low => ("Low risk", "Add risk exposure, sell puts, add leverage"),
});

/// Composite score: elevated VIX +2, calm VIX -1, high yield +1, low yield -1,
/// rising VIX trend +1.
pub fn risk_score(vix: f64, bond: f64, vix_rising: bool, t: &Thresholds) -> i32 {
    let mut score = 0;
    if vix > t.vix_high {
        score += 2;
    } else if vix < t.vix_low {
        score -= 1;
    }
    if bond > t.risk_bond_high {
        score += 1;
    } else if bond < t.risk_bond_low {
        score -= 1;
    }
    if vix_rising {
        score += 1;
    }
    score
}

pub fn classify_risk(score: i32) -> RiskLevel {
    if score >= 3 {
        RiskLevel::High
    } else if score >= 1 {
        RiskLevel::Medium
    } else if score <= -1 {
        RiskLevel::Low
    } else {
        RiskLevel::Moderate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CnyRegime {
    Depreciation,
    Appreciation,
    Stable,
}

labelled!(CnyRegime {
    Depreciation => ("depreciation", "Fast depreciation: capital outflow pressure, Hong Kong under strain"),
    Appreciation => ("appreciation", "Fast appreciation: foreign inflows, Hong Kong benefits"),
    Stable => ("stable", "Relatively stable: FX is not the main driver"),
});

/// USD/CNY 5-day percent change; a rising rate is a weaker yuan.
pub fn classify_cny(change_5d: f64, t: &Thresholds) -> CnyRegime {
    if change_5d > t.cny_move_pct {
        CnyRegime::Depreciation
    } else if change_5d < -t.cny_move_pct {
        CnyRegime::Appreciation
    } else {
        CnyRegime::Stable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    Strong,
    Moderate,
    Weak,
}

labelled!(Linkage {
    Strong => ("Strong linkage", "Hong Kong tracks US equities closely, weak independent pricing"),
    Moderate => ("Moderate linkage", "Mixed influence: watch US equities but do not map one-to-one"),
    Weak => ("Weak linkage", "Hong Kong trades on its own, driven more by A-shares or policy"),
});

pub fn classify_linkage(corr: f64, t: &Thresholds) -> Linkage {
    if corr > t.linkage_strong {
        Linkage::Strong
    } else if corr < t.linkage_weak {
        Linkage::Weak
    } else {
        Linkage::Moderate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeStrength {
    Outperform,
    InLine,
    Underperform,
}

labelled!(RelativeStrength {
    Outperform => ("Hong Kong outperforming", "Valuation repair, policy support, southbound inflows"),
    InLine => ("Broadly in line", "Correlation with US equities dominates"),
    Underperform => ("Hong Kong underperforming", "FX weakness, regulatory worries, foreign outflows"),
});

pub fn classify_relative_strength(diff: f64, t: &Thresholds) -> RelativeStrength {
    if diff > t.relative_strength_pct {
        RelativeStrength::Outperform
    } else if diff < -t.relative_strength_pct {
        RelativeStrength::Underperform
    } else {
        RelativeStrength::InLine
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginSignal {
    AcceleratingIn,
    AcceleratingOut,
    SteadyInflow,
    SteadyOutflow,
    Stable,
}

labelled!(MarginSignal {
    AcceleratingIn => ("Accelerating inflow", "Leveraged money entering fast, sentiment heated"),
    AcceleratingOut => ("Accelerating outflow", "Leveraged money leaving fast, confidence weak"),
    SteadyInflow => ("Steady inflow", "Leverage building steadily, trend constructive"),
    SteadyOutflow => ("Steady outflow", "Leverage unwinding steadily, trend under pressure"),
    Stable => ("Stable", "Leverage flat, sentiment neutral"),
});

/// The 5-day rungs take precedence over the 30-day ones.
pub fn classify_margin(change_5d: f64, change_30d: f64, t: &Thresholds) -> MarginSignal {
    if change_5d > t.margin_fast_pct {
        MarginSignal::AcceleratingIn
    } else if change_5d < -t.margin_fast_pct {
        MarginSignal::AcceleratingOut
    } else if change_30d > t.margin_trend_pct {
        MarginSignal::SteadyInflow
    } else if change_30d < -t.margin_trend_pct {
        MarginSignal::SteadyOutflow
    } else {
        MarginSignal::Stable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBand {
    High,
    Neutral,
    Low,
}

labelled!(RateBand {
    High => ("Rates high", "Interbank liquidity tight, may tighten further"),
    Neutral => ("Rates neutral", "Interbank liquidity neutral"),
    Low => ("Rates low", "Interbank liquidity ample, policy easy"),
});

pub fn classify_shibor(rate: f64, t: &Thresholds) -> RateBand {
    if rate > t.shibor_high {
        RateBand::High
    } else if rate < t.shibor_low {
        RateBand::Low
    } else {
        RateBand::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadSignal {
    Widening,
    Normal,
    Narrowing,
}

labelled!(SpreadSignal {
    Widening => ("Spread wide", "China's relative appeal falling, outflow pressure"),
    Normal => ("Spread normal", "Relative appeal neutral"),
    Narrowing => ("Spread narrow", "China's relative appeal rising, inflows"),
});

pub fn classify_spread(spread: f64, t: &Thresholds) -> SpreadSignal {
    if spread > t.spread_wide {
        SpreadSignal::Widening
    } else if spread < t.spread_narrow {
        SpreadSignal::Narrowing
    } else {
        SpreadSignal::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityEnv {
    Loose,
    Neutral,
    Tight,
}

labelled!(LiquidityEnv {
    Loose => ("Loose", "Ample liquidity, supportive of risk assets"),
    Neutral => ("Neutral", "Neutral liquidity, mixed market"),
    Tight => ("Tight", "Tight liquidity, weighs on risk assets"),
});

/// Margin momentum ±1, cheap/expensive interbank money ±1, wide spread -1.
pub fn liquidity_score(
    margin_5d: f64,
    shibor: f64,
    spread: Option<f64>,
    t: &Thresholds,
) -> i32 {
    let mut score = 0;
    if margin_5d > t.margin_score_pct {
        score += 1;
    } else if margin_5d < -t.margin_score_pct {
        score -= 1;
    }
    if shibor < t.shibor_loose {
        score += 1;
    } else if shibor > t.shibor_high {
        score -= 1;
    }
    if spread.is_some_and(|s| s > t.spread_wide) {
        score -= 1;
    }
    score
}

pub fn classify_liquidity(score: i32) -> LiquidityEnv {
    if score >= 1 {
        LiquidityEnv::Loose
    } else if score <= -1 {
        LiquidityEnv::Tight
    } else {
        LiquidityEnv::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationIntensity {
    Violent,
    Normal,
    Mild,
    /// Fewer than three sectors with data.
    Undetermined,
}

labelled!(RotationIntensity {
    Violent => ("Violent rotation", "Sectors sharply divergent, chasing is risky"),
    Normal => ("Normal rotation", "Structural opportunities dominate"),
    Mild => ("Mild rotation", "Sectors moving together, broad rally"),
    Undetermined => ("Neutral", ""),
});

pub fn classify_dispersion(dispersion: f64, t: &Thresholds) -> RotationIntensity {
    if dispersion > t.dispersion_violent {
        RotationIntensity::Violent
    } else if dispersion < t.dispersion_mild {
        RotationIntensity::Mild
    } else {
        RotationIntensity::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valuation {
    EquitiesCheap,
    Neutral,
    EquitiesRich,
}

labelled!(Valuation {
    EquitiesCheap => ("Equities cheap vs bonds", "Earnings yield premium near the top of its history"),
    Neutral => ("Neutral", "Earnings yield premium within its usual range"),
    EquitiesRich => ("Equities rich vs bonds", "Earnings yield premium near the bottom of its history"),
});

pub fn classify_valuation(percentile: f64, t: &Thresholds) -> Valuation {
    if percentile >= t.erp_cheap_percentile {
        Valuation::EquitiesCheap
    } else if percentile <= t.erp_rich_percentile {
        Valuation::EquitiesRich
    } else {
        Valuation::Neutral
    }
}
