//! The market analyzer.
//!
//! Each analysis reads a handful of bundle keys, checks them with
//! [`validate`], and returns a typed result whose `summary()` is the one-line
//! insight the reports carry. Too little data is an [`AnalysisError`], never
//! a panic.

use super::error::AnalysisError;
use super::regime::{self, *};
use super::stats::{self, Trend};
use crate::data::roster::symbols;
use crate::series::{Series, SeriesBundle};
use crate::validation::{percentile_rank, validate, DEFAULT_MIN_POINTS};
use serde::Serialize;
use std::collections::BTreeMap;

/// Yuan per 亿 (10^8).
const YI: f64 = 1e8;

#[derive(Debug, Clone, Serialize)]
pub struct IndexTriple {
    pub nasdaq: f64,
    pub sp500: f64,
    pub russell: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexDivergence {
    pub returns: IndexTriple,
    pub volatilities: IndexTriple,
    pub corr_nasdaq_sp500: Option<f64>,
    pub corr_nasdaq_russell: Option<f64>,
    pub corr_sp500_russell: Option<f64>,
    pub trends: [Trend; 3],
    pub style: MarketStyle,
    /// Small-cap volatility well above the three-index average.
    pub small_cap_vol_alert: bool,
    /// Nasdaq and Russell decoupling.
    pub size_divergence_alert: bool,
}

impl IndexDivergence {
    pub fn summary(&self) -> String {
        format!(
            "Nasdaq {:+.2}% S&P {:+.2}% Russell {:+.2}% {}",
            self.returns.nasdaq, self.returns.sp500, self.returns.russell, self.style
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskRegime {
    pub vix: f64,
    pub bond_yield: f64,
    pub vix_change_5d: f64,
    pub bond_change_5d: f64,
    pub vix_percentile: f64,
    pub bond_percentile: f64,
    pub vix_level: VixLevel,
    pub bond_level: BondLevel,
    pub vix_trend: Trend,
    pub bond_trend: Trend,
    pub stock_bond_corr: Option<f64>,
    pub stock_bond_regime: Option<CorrelationRegime>,
    pub risk_score: i32,
    pub risk_level: RiskLevel,
}

impl RiskRegime {
    pub fn action(&self) -> &'static str {
        self.risk_level.describe()
    }

    pub fn summary(&self) -> String {
        format!(
            "VIX {:.2} 10Y {:.2}% {}",
            self.vix, self.bond_yield, self.risk_level
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChinaUsLinkage {
    pub hsi_return: f64,
    pub sp500_return: f64,
    pub usd_cny: f64,
    pub cny_change_5d: f64,
    pub cny_change_30d: f64,
    pub cny_regime: CnyRegime,
    pub corr_hsi_sp500: Option<f64>,
    /// Against the negated FX return, so positive means a stronger yuan
    /// goes with a stronger Hang Seng.
    pub corr_hsi_cny: Option<f64>,
    pub corr_sp500_cny: Option<f64>,
    pub linkage: Linkage,
    pub relative_strength: f64,
    pub strength: RelativeStrength,
    pub fx_divergence: bool,
    pub double_pressure: bool,
    pub double_tailwind: bool,
}

impl ChinaUsLinkage {
    pub fn summary(&self) -> String {
        format!(
            "HSI {:+.2}% CNY {:+.2}% {}",
            self.hsi_return, self.cny_change_5d, self.linkage
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Liquidity {
    /// Margin balance in 亿 yuan.
    pub margin_balance: f64,
    pub margin_change_5d: f64,
    pub margin_change_30d: f64,
    pub shibor: f64,
    pub shibor_change: f64,
    pub spread: Option<f64>,
    pub spread_change_5d: Option<f64>,
    pub margin_signal: MarginSignal,
    pub shibor_band: RateBand,
    pub spread_signal: Option<SpreadSignal>,
    pub liquidity_score: i32,
    pub environment: LiquidityEnv,
}

impl Liquidity {
    pub fn summary(&self) -> String {
        format!(
            "Margin {:.0}亿 Shibor {:.2}% {}",
            self.margin_balance, self.shibor, self.environment
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorRotation {
    /// (label, return %) sorted best first.
    pub sorted_returns: Vec<(String, f64)>,
    pub leaders: Vec<String>,
    pub laggards: Vec<String>,
    pub dispersion: f64,
    pub intensity: RotationIntensity,
    pub style: String,
}

impl SectorRotation {
    pub fn summary(&self) -> String {
        format!(
            "Leaders {} / laggards {} ({}, {})",
            self.leaders.join(", "),
            self.laggards.join(", "),
            self.intensity,
            self.style
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EquityBondSpread {
    pub pe: f64,
    /// 100 / PE, in percent.
    pub earnings_yield: f64,
    pub bond_yield: f64,
    pub spread: f64,
    pub percentile: f64,
    pub valuation: Valuation,
    #[serde(skip)]
    pub history: Series,
}

impl EquityBondSpread {
    pub fn summary(&self) -> String {
        format!(
            "SSE50 E/P {:.2}% - CN10Y {:.2}% = {:+.2}pp ({:.0}th pct) {}",
            self.earnings_yield, self.bond_yield, self.spread, self.percentile, self.valuation
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OilGoldRatio {
    pub ratio: f64,
    pub percentile: f64,
    pub us_bond: f64,
    pub corr_us_bond: Option<f64>,
    #[serde(skip)]
    pub history: Series,
    #[serde(skip)]
    pub us_bond_history: Series,
}

impl OilGoldRatio {
    pub fn summary(&self) -> String {
        let corr = self
            .corr_us_bond
            .map_or_else(|| "n/a".to_string(), |c| format!("{c:.3}"));
        format!(
            "Oil/gold {:.4} ({:.0}th pct), US10Y {:.2}%, corr {corr}",
            self.ratio, self.percentile, self.us_bond
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarginTrend {
    /// Latest balance in 亿 yuan.
    pub balance: f64,
    pub ma10: f64,
    pub below_ma10: bool,
    #[serde(skip)]
    pub balance_history: Series,
    #[serde(skip)]
    pub ma10_history: Series,
}

impl MarginTrend {
    pub fn summary(&self) -> String {
        let position = if self.below_ma10 { "below" } else { "above" };
        format!(
            "Margin {:.0}亿, {position} MA10 {:.0}亿",
            self.balance, self.ma10
        )
    }
}

/// Read-only analyzer over a bundle.
pub struct MarketAnalyzer<'a> {
    bundle: &'a SeriesBundle,
    thresholds: &'a Thresholds,
}

impl<'a> MarketAnalyzer<'a> {
    pub fn new(bundle: &'a SeriesBundle, thresholds: &'a Thresholds) -> Self {
        Self { bundle, thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        self.thresholds
    }

    fn series(&self, symbol: &str) -> Result<&'a Series, AnalysisError> {
        self.bundle
            .get(symbol)
            .ok_or_else(|| AnalysisError::MissingSymbol(symbol.to_string()))
    }

    /// Full history for `symbol`, required to hold `needed` points.
    fn require(&self, symbol: &str, needed: usize) -> Result<&'a Series, AnalysisError> {
        let series = self.series(symbol)?;
        if validate(Some(series), needed) {
            Ok(series)
        } else {
            Err(AnalysisError::InsufficientData {
                what: symbol.to_string(),
                needed,
                got: series.valid_count(),
            })
        }
    }

    /// The recent analysis window of `symbol`, required to hold `needed` points.
    fn windowed(&self, symbol: &str, needed: usize) -> Result<Series, AnalysisError> {
        let series = self.series(symbol)?.tail(self.thresholds.analysis_window);
        if validate(Some(&series), needed) {
            Ok(series)
        } else {
            Err(AnalysisError::InsufficientData {
                what: symbol.to_string(),
                needed,
                got: series.valid_count(),
            })
        }
    }

    fn lookback_return(&self, series: &Series, what: &str) -> Result<f64, AnalysisError> {
        let lookback = self.thresholds.return_lookback;
        stats::period_return(series, lookback).ok_or_else(|| AnalysisError::InsufficientData {
            what: what.to_string(),
            needed: lookback,
            got: series.len(),
        })
    }

    fn change_5d(series: &Series) -> f64 {
        stats::period_return(series, 5).unwrap_or(f64::NAN)
    }

    /// Growth/value/breadth reading from Nasdaq, S&P 500 and Russell 2000.
    pub fn index_divergence(&self) -> Result<IndexDivergence, AnalysisError> {
        let t = self.thresholds;
        let nasdaq = self.windowed(symbols::NASDAQ, t.min_points)?;
        let sp500 = self.windowed(symbols::SP500, t.min_points)?;
        let russell = self.windowed(symbols::RUSSELL_2000, t.min_points)?;

        let returns = IndexTriple {
            nasdaq: self.lookback_return(&nasdaq, symbols::NASDAQ)?,
            sp500: self.lookback_return(&sp500, symbols::SP500)?,
            russell: self.lookback_return(&russell, symbols::RUSSELL_2000)?,
        };
        let vol = |s: &Series| stats::annualized_volatility(s, t.volatility_window).unwrap_or(f64::NAN);
        let volatilities = IndexTriple {
            nasdaq: vol(&nasdaq),
            sp500: vol(&sp500),
            russell: vol(&russell),
        };

        let corr_nasdaq_sp500 = stats::correlation(&nasdaq, &sp500);
        let corr_nasdaq_russell = stats::correlation(&nasdaq, &russell);
        let corr_sp500_russell = stats::correlation(&sp500, &russell);

        let avg_vol = (volatilities.nasdaq + volatilities.sp500 + volatilities.russell) / 3.0;

        Ok(IndexDivergence {
            trends: [
                stats::trend(&nasdaq, t.trend_period),
                stats::trend(&sp500, t.trend_period),
                stats::trend(&russell, t.trend_period),
            ],
            style: classify_style(returns.nasdaq, returns.sp500, returns.russell, t),
            small_cap_vol_alert: volatilities.russell > avg_vol * t.small_cap_vol_ratio,
            size_divergence_alert: corr_nasdaq_russell.is_some_and(|c| c < t.size_corr_floor),
            returns,
            volatilities,
            corr_nasdaq_sp500,
            corr_nasdaq_russell,
            corr_sp500_russell,
        })
    }

    /// VIX and 10Y yield bands, stock-bond correlation, composite risk score.
    pub fn risk_regime(&self) -> Result<RiskRegime, AnalysisError> {
        let t = self.thresholds;
        let vix = self.windowed(symbols::VIX, t.min_points)?;
        let ten_year = self.windowed(symbols::US_10Y_YIELD, t.min_points)?;

        let (Some(current_vix), Some(current_bond)) = (vix.last_value(), ten_year.last_value())
        else {
            return Err(AnalysisError::NoValidData("risk regime".into()));
        };

        let vix_trend = stats::trend(&vix, t.trend_period);
        let bond_trend = stats::trend(&ten_year, t.trend_period);

        let stock_bond_corr = self.windowed(symbols::SP500, t.min_points).ok().and_then(|sp| {
            stats::aligned_pearson(&sp.pct_change(1).tail(30), &ten_year.diff(1).tail(30))
        });

        let score = regime::risk_score(current_vix, current_bond, vix_trend == Trend::Up, t);

        Ok(RiskRegime {
            vix: current_vix,
            bond_yield: current_bond,
            vix_change_5d: Self::change_5d(&vix),
            bond_change_5d: Self::change_5d(&ten_year),
            vix_percentile: percentile_rank(&vix, current_vix),
            bond_percentile: percentile_rank(&ten_year, current_bond),
            vix_level: classify_vix(current_vix, t),
            bond_level: classify_bond(current_bond, t),
            vix_trend,
            bond_trend,
            stock_bond_corr,
            stock_bond_regime: stock_bond_corr.map(|c| classify_stock_bond(c, t)),
            risk_score: score,
            risk_level: classify_risk(score),
        })
    }

    /// Hang Seng against the S&P 500 and the yuan.
    pub fn china_us_linkage(&self) -> Result<ChinaUsLinkage, AnalysisError> {
        let t = self.thresholds;
        let hsi = self.windowed(symbols::HANG_SENG, t.min_points)?;
        let usd_cny = self.windowed(symbols::USD_CNY, t.min_points)?;
        let sp500 = self.windowed(symbols::SP500, t.min_points)?;

        let current_cny = usd_cny
            .last_value()
            .ok_or_else(|| AnalysisError::NoValidData(symbols::USD_CNY.into()))?;
        let cny_change_5d = Self::change_5d(&usd_cny);
        let cny_change_30d = self.lookback_return(&usd_cny, symbols::USD_CNY)?;
        let hsi_return = self.lookback_return(&hsi, symbols::HANG_SENG)?;
        let sp500_return = self.lookback_return(&sp500, symbols::SP500)?;

        // One sample for all three correlations: dates every series has.
        let (hsi_common, sp500_common, cny_common) = align3(&hsi, &sp500, &usd_cny);
        let corr_hsi_sp500 = stats::correlation(&hsi_common, &sp500_common);
        let corr_hsi_cny = stats::correlation(&hsi_common, &cny_common).map(|c| -c);
        let corr_sp500_cny = stats::correlation(&sp500_common, &cny_common).map(|c| -c);

        let relative_strength = hsi_return - sp500_return;
        let rs = t.relative_strength_pct;

        Ok(ChinaUsLinkage {
            hsi_return,
            sp500_return,
            usd_cny: current_cny,
            cny_change_5d,
            cny_change_30d,
            cny_regime: classify_cny(cny_change_5d, t),
            corr_hsi_sp500,
            corr_hsi_cny,
            corr_sp500_cny,
            linkage: corr_hsi_sp500.map_or(Linkage::Moderate, |c| classify_linkage(c, t)),
            relative_strength,
            strength: classify_relative_strength(relative_strength, t),
            fx_divergence: corr_hsi_cny.is_some_and(|c| c < t.fx_divergence_corr),
            double_pressure: relative_strength < -rs && cny_change_5d > t.cny_move_pct,
            double_tailwind: relative_strength > rs && cny_change_5d < -t.cny_move_pct,
        })
    }

    /// Margin financing, interbank rate and the China/US yield spread.
    pub fn liquidity(&self) -> Result<Liquidity, AnalysisError> {
        let t = self.thresholds;
        let margin = self.require(symbols::MARGIN_BALANCE, t.margin_min_points)?;
        let shibor = self.require(symbols::SHIBOR_1M, t.shibor_min_points)?;

        let last = |s: Series| s.last_value().unwrap_or(f64::NAN);
        let margin_balance = margin.last_value().unwrap_or(f64::NAN) / YI;
        let margin_change_5d = last(margin.pct_change(5)) * 100.0;
        let margin_change_30d = last(margin.pct_change(30)) * 100.0;
        let current_shibor = shibor.last_value().unwrap_or(f64::NAN);
        let shibor_change = last(shibor.pct_change(1)) * 100.0;

        let spread_series = self
            .require(symbols::CN_US_SPREAD, DEFAULT_MIN_POINTS)
            .ok();
        let spread = spread_series.and_then(Series::last_value);
        let spread_change_5d = spread_series.map(|s| last(s.diff(5)));

        let score = regime::liquidity_score(margin_change_5d, current_shibor, spread, t);

        Ok(Liquidity {
            margin_balance,
            margin_change_5d,
            margin_change_30d,
            shibor: current_shibor,
            shibor_change,
            spread,
            spread_change_5d,
            margin_signal: classify_margin(margin_change_5d, margin_change_30d, t),
            shibor_band: classify_shibor(current_shibor, t),
            spread_signal: spread.map(|s| classify_spread(s, t)),
            liquidity_score: score,
            environment: classify_liquidity(score),
        })
    }

    /// One-month sector ETF returns, ranked.
    ///
    /// `sectors` maps a display label to the bundle key of its ETF. Sectors
    /// without enough data are left out.
    pub fn sector_rotation(
        &self,
        sectors: &BTreeMap<String, String>,
    ) -> Result<SectorRotation, AnalysisError> {
        let t = self.thresholds;
        let mut sorted_returns: Vec<(String, f64)> = sectors
            .iter()
            .filter_map(|(label, ticker)| {
                let window = self.bundle.get(ticker)?.tail(t.sector_window);
                if !validate(Some(&window), t.sector_min_points) {
                    tracing::debug!(sector = %label, ticker = %ticker, "skipping sector");
                    return None;
                }
                let ret = stats::total_return(&window).filter(|r| r.is_finite())?;
                Some((label.clone(), ret))
            })
            .collect();

        if sorted_returns.is_empty() {
            return Err(AnalysisError::NoValidData("sector ETFs".into()));
        }
        sorted_returns.sort_by(|a, b| b.1.total_cmp(&a.1));

        let n = sorted_returns.len();
        let leaders: Vec<String> = sorted_returns.iter().take(2).map(|(s, _)| s.clone()).collect();
        let laggards: Vec<String> = sorted_returns[n.saturating_sub(2)..]
            .iter()
            .map(|(s, _)| s.clone())
            .collect();

        let (dispersion, intensity) = if n >= 3 {
            let avg = |xs: &[(String, f64)]| xs.iter().map(|(_, r)| r).sum::<f64>() / xs.len() as f64;
            let dispersion = avg(&sorted_returns[..3]) - avg(&sorted_returns[n - 3..]);
            (dispersion, classify_dispersion(dispersion, t))
        } else {
            (0.0, RotationIntensity::Undetermined)
        };

        let mut styles = Vec::new();
        if leaders.iter().any(|s| s.contains("Tech")) {
            styles.push("US growth");
        }
        if leaders
            .iter()
            .any(|s| s.contains("Financials") || s.contains("Energy"))
        {
            styles.push("US value");
        }
        let style = if styles.is_empty() {
            "Style unclear".to_string()
        } else {
            styles.join(" + ")
        };

        Ok(SectorRotation {
            sorted_returns,
            leaders,
            laggards,
            dispersion,
            intensity,
            style,
        })
    }

    /// SSE 50 earnings yield against the China 10Y yield.
    pub fn equity_bond_spread(&self) -> Result<EquityBondSpread, AnalysisError> {
        let t = self.thresholds;
        let pe = self.require(symbols::SSE50_PE_TTM, t.min_points)?;
        let bond = self.require(symbols::CN_BOND_10Y, t.min_points)?;

        let history = pe
            .map(|p| 100.0 / p)
            .zip_with(bond, |ey, y| ey - y)
            .map(|v| if v.is_finite() { v } else { f64::NAN })
            .drop_nan();
        if !validate(Some(&history), t.min_points) {
            return Err(AnalysisError::InsufficientData {
                what: "equity-bond spread".into(),
                needed: t.min_points,
                got: history.len(),
            });
        }

        let (date, spread) = history
            .last()
            .ok_or_else(|| AnalysisError::NoValidData("equity-bond spread".into()))?;
        let pe_now = pe.last_value().unwrap_or(f64::NAN);
        let bond_now = bond
            .iter()
            .filter(|(d, _)| *d <= date)
            .last()
            .map_or(f64::NAN, |(_, v)| v);
        let percentile = percentile_rank(&history, spread);

        Ok(EquityBondSpread {
            pe: pe_now,
            earnings_yield: 100.0 / pe_now,
            bond_yield: bond_now,
            spread,
            percentile,
            valuation: classify_valuation(percentile, t),
            history,
        })
    }

    /// Crude/gold price ratio against the US 10Y yield.
    pub fn oil_gold_ratio(&self) -> Result<OilGoldRatio, AnalysisError> {
        let t = self.thresholds;
        let oil = self.require(symbols::CRUDE_OIL, t.commodity_min_points)?;
        let gold = self.require(symbols::GOLD, t.commodity_min_points)?;

        let ratio = oil.zip_with(gold, |o, g| o / g);
        if !validate(Some(&ratio), t.min_points) {
            return Err(AnalysisError::InsufficientData {
                what: "oil/gold overlap".into(),
                needed: t.min_points,
                got: ratio.len(),
            });
        }
        let us_bond = self.require(symbols::US_BOND, t.min_points)?;

        let current = ratio
            .last_value()
            .ok_or_else(|| AnalysisError::NoValidData("oil/gold ratio".into()))?;

        Ok(OilGoldRatio {
            ratio: current,
            percentile: percentile_rank(&ratio, current),
            us_bond: us_bond.last_value().unwrap_or(f64::NAN),
            corr_us_bond: stats::correlation(&ratio, us_bond),
            history: ratio,
            us_bond_history: us_bond.clone(),
        })
    }

    /// Latest margin balance against its 10-day moving average.
    pub fn margin_vs_ma10(&self) -> Result<MarginTrend, AnalysisError> {
        let margin = self.require(symbols::MARGIN_BALANCE, self.thresholds.margin_min_points)?;
        let ma10 = margin.rolling_mean(10);

        let latest = margin.last_value().unwrap_or(f64::NAN);
        let latest_ma = ma10.last_value().unwrap_or(f64::NAN);

        Ok(MarginTrend {
            balance: latest / YI,
            ma10: latest_ma / YI,
            below_ma10: latest < latest_ma,
            balance_history: margin.tail(50),
            ma10_history: ma10.tail(50),
        })
    }
}

/// Restrict three series to the dates where all of them have a value.
fn align3(a: &Series, b: &Series, c: &Series) -> (Series, Series, Series) {
    let (a, b) = a.drop_nan().inner_join(&b.drop_nan());
    let (a, c) = a.inner_join(&c.drop_nan());
    let (b, _) = b.inner_join(&c);
    (a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::test_support::series_from;

    fn linear(n: usize, start: f64, step: f64) -> Series {
        series_from(&(0..n).map(|i| start + step * i as f64).collect::<Vec<_>>())
    }

    fn wavy(n: usize, base: f64, amp: f64, phase: f64) -> Series {
        series_from(
            &(0..n)
                .map(|i| base + amp * ((i as f64) * 0.7 + phase).sin() + i as f64 * 0.1)
                .collect::<Vec<_>>(),
        )
    }

    fn bundle(entries: Vec<(&str, Series)>) -> SeriesBundle {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn missing_symbol_is_typed() {
        let b = SeriesBundle::new();
        let t = Thresholds::default();
        let err = MarketAnalyzer::new(&b, &t).index_divergence().unwrap_err();
        assert!(matches!(err, AnalysisError::MissingSymbol(_)));
    }

    #[test]
    fn short_series_is_insufficient() {
        let b = bundle(vec![
            (symbols::NASDAQ, linear(10, 100.0, 1.0)),
            (symbols::SP500, linear(10, 100.0, 1.0)),
            (symbols::RUSSELL_2000, linear(10, 100.0, 1.0)),
        ]);
        let t = Thresholds::default();
        let err = MarketAnalyzer::new(&b, &t).index_divergence().unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { needed: 30, got: 10, .. }
        ));
        assert!(err.is_data_shortage());
    }

    #[test]
    fn growth_style_when_tech_leads() {
        let b = bundle(vec![
            (symbols::NASDAQ, wavy(63, 100.0, 1.0, 0.0).zip_with(&linear(63, 0.0, 0.5), |a, b| a + b)),
            (symbols::SP500, wavy(63, 100.0, 1.0, 0.3)),
            (symbols::RUSSELL_2000, wavy(63, 100.0, 1.0, 0.6).zip_with(&linear(63, 0.0, -0.3), |a, b| a + b)),
        ]);
        let t = Thresholds::default();
        let result = MarketAnalyzer::new(&b, &t).index_divergence().unwrap();
        assert!(result.returns.nasdaq > result.returns.sp500);
        assert!(result.returns.sp500 > result.returns.russell);
        assert_eq!(result.style, MarketStyle::Growth);
        assert_eq!(result.trends[0], Trend::Up);
        assert!(result.summary().contains("Growth"));
    }

    #[test]
    fn risk_regime_high_vix_high_yield() {
        let vix: Vec<f64> = (0..40).map(|i| 20.0 + i as f64 * 0.25).collect();
        let b = bundle(vec![
            (symbols::VIX, series_from(&vix)),
            (symbols::US_10Y_YIELD, linear(40, 4.6, 0.005)),
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).risk_regime().unwrap();
        assert_eq!(r.vix_level, VixLevel::High);
        assert_eq!(r.vix_trend, Trend::Up);
        assert_eq!(r.risk_score, 4);
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.vix_percentile, 100.0);
        // No S&P series: correlation skipped, not an error.
        assert!(r.stock_bond_corr.is_none());
    }

    #[test]
    fn linkage_flags_double_pressure() {
        // HSI falls ~10% over the window while the S&P rises; yuan weakens fast.
        let hsi = wavy(63, 100.0, 0.5, 0.0).zip_with(&linear(63, 0.0, -0.4), |a, b| a + b);
        let sp = wavy(63, 100.0, 0.5, 1.0).zip_with(&linear(63, 0.0, 0.2), |a, b| a + b);
        let mut cny: Vec<f64> = (0..63).map(|i| 7.0 + 0.0005 * (i as f64 * 0.9).sin()).collect();
        for (k, v) in cny.iter_mut().rev().take(4).enumerate() {
            *v += 0.1 - 0.01 * k as f64;
        }
        let b = bundle(vec![
            (symbols::HANG_SENG, hsi),
            (symbols::SP500, sp),
            (symbols::USD_CNY, series_from(&cny)),
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).china_us_linkage().unwrap();
        assert_eq!(r.cny_regime, CnyRegime::Depreciation);
        assert_eq!(r.strength, RelativeStrength::Underperform);
        assert!(r.double_pressure);
        assert!(!r.double_tailwind);
    }

    #[test]
    fn linkage_correlates_on_dates_all_three_share() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let day = |i: i64| start + chrono::Duration::days(i);
        let hsi_at = |i: i64| 100.0 + (i % 5) as f64 + 0.1 * i as f64;

        let hsi = Series::from_points((0..63).map(|i| (day(i), hsi_at(i))));
        // Tracks HSI on even days, unrelated noise on odd days.
        let sp500 = Series::from_points((0..63).map(|i| {
            let v = if i % 2 == 0 {
                hsi_at(i)
            } else {
                300.0 + 40.0 * ((i * 7) % 11) as f64
            };
            (day(i), v)
        }));
        // The yuan only prints on even days.
        let usd_cny = Series::from_points(
            (0..63)
                .filter(|i| i % 2 == 0)
                .map(|i| (day(i), 7.0 + 0.01 * ((i * 3) % 7) as f64)),
        );

        let pairwise = stats::correlation(&hsi, &sp500).unwrap();
        assert!(pairwise < 0.99);

        let b = bundle(vec![
            (symbols::HANG_SENG, hsi),
            (symbols::SP500, sp500),
            (symbols::USD_CNY, usd_cny),
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).china_us_linkage().unwrap();
        assert!((r.corr_hsi_sp500.unwrap() - 1.0).abs() < 1e-9);
        assert!(r.corr_hsi_cny.is_some());
    }

    #[test]
    fn align3_keeps_only_shared_dates() {
        let a = series_from(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = series_from(&[1.0, f64::NAN, 3.0, 4.0, 5.0]);
        let c = series_from(&[1.0, 2.0, 3.0, f64::NAN]);
        let (a, b, c) = align3(&a, &b, &c);
        assert_eq!(a.len(), 2);
        assert_eq!(a.index(), b.index());
        assert_eq!(b.index(), c.index());
        assert_eq!(c.values(), &[1.0, 3.0]);
    }

    #[test]
    fn liquidity_loose_with_rising_margin_and_cheap_money() {
        let margin: Vec<f64> = (0..60).map(|i| 8.0e11 * 1.005_f64.powi(i)).collect();
        let b = bundle(vec![
            (symbols::MARGIN_BALANCE, series_from(&margin)),
            (symbols::SHIBOR_1M, linear(40, 1.9, 0.0)),
            (symbols::CN_US_SPREAD, linear(40, -2.0, 0.0)),
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).liquidity().unwrap();
        assert!((r.margin_change_5d - (1.005_f64.powi(5) - 1.0) * 100.0).abs() < 1e-9);
        assert_eq!(r.margin_signal, MarginSignal::AcceleratingIn);
        assert_eq!(r.shibor_band, RateBand::Low);
        assert_eq!(r.spread_signal, Some(SpreadSignal::Narrowing));
        assert_eq!(r.liquidity_score, 2);
        assert_eq!(r.environment, LiquidityEnv::Loose);
        assert!(r.summary().contains("亿"));
    }

    #[test]
    fn liquidity_without_spread_still_scores() {
        let b = bundle(vec![
            (symbols::MARGIN_BALANCE, linear(60, 8.0e11, 0.0)),
            (symbols::SHIBOR_1M, linear(40, 3.2, 0.0)),
            (symbols::CN_US_SPREAD, Series::empty()),
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).liquidity().unwrap();
        assert!(r.spread.is_none());
        assert_eq!(r.liquidity_score, -1);
        assert_eq!(r.environment, LiquidityEnv::Tight);
    }

    #[test]
    fn sector_rotation_ranks_and_labels() {
        let sectors: BTreeMap<String, String> = [
            ("US Tech", "QQQ"),
            ("US Financials", "XLF"),
            ("US Healthcare", "XLV"),
            ("US Energy", "XLE"),
        ]
        .iter()
        .map(|(l, t)| (l.to_string(), t.to_string()))
        .collect();
        let b = bundle(vec![
            ("QQQ", linear(21, 100.0, 0.6)),  // +12%
            ("XLF", linear(21, 100.0, 0.25)), // +5%
            ("XLV", linear(21, 100.0, -0.1)), // -2%
            ("XLE", linear(5, 100.0, 1.0)),   // too short
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).sector_rotation(&sectors).unwrap();
        assert_eq!(r.sorted_returns.len(), 3);
        assert_eq!(r.leaders, vec!["US Tech".to_string(), "US Financials".to_string()]);
        assert_eq!(r.laggards, vec!["US Financials".to_string(), "US Healthcare".to_string()]);
        // All three sectors are both top-3 and bottom-3.
        assert!(r.dispersion.abs() < 1e-9);
        assert_eq!(r.intensity, RotationIntensity::Mild);
        assert_eq!(r.style, "US growth + US value");
    }

    #[test]
    fn sector_rotation_without_data_errors() {
        let sectors = BTreeMap::from([("US Tech".to_string(), "QQQ".to_string())]);
        let b = SeriesBundle::new();
        let t = Thresholds::default();
        assert!(matches!(
            MarketAnalyzer::new(&b, &t).sector_rotation(&sectors),
            Err(AnalysisError::NoValidData(_))
        ));
    }

    #[test]
    fn equity_bond_spread_percentile() {
        // PE falling from 12 to ~10: earnings yield rising, spread at its high.
        let pe = linear(40, 12.0, -0.05);
        let b = bundle(vec![
            (symbols::SSE50_PE_TTM, pe),
            (symbols::CN_BOND_10Y, linear(40, 2.5, 0.0)),
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).equity_bond_spread().unwrap();
        assert_eq!(r.percentile, 100.0);
        assert_eq!(r.valuation, Valuation::EquitiesCheap);
        assert!((r.spread - (100.0 / r.pe - 2.5)).abs() < 1e-9);
    }

    #[test]
    fn oil_gold_ratio_on_shared_dates() {
        let b = bundle(vec![
            (symbols::CRUDE_OIL, linear(60, 80.0, 0.1)),
            (symbols::GOLD, linear(60, 2000.0, 0.0)),
            (symbols::US_BOND, wavy(60, 4.2, 0.1, 0.0)),
        ]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).oil_gold_ratio().unwrap();
        assert!((r.ratio - (80.0 + 5.9) / 2000.0).abs() < 1e-12);
        assert_eq!(r.percentile, 100.0);
        assert_eq!(r.history.len(), 60);
    }

    #[test]
    fn margin_below_ma10_after_drop() {
        let mut values = vec![9.0e11; 55];
        values.extend([8.5e11; 5]);
        let b = bundle(vec![(symbols::MARGIN_BALANCE, series_from(&values))]);
        let t = Thresholds::default();
        let r = MarketAnalyzer::new(&b, &t).margin_vs_ma10().unwrap();
        assert!(r.below_ma10);
        assert!((r.balance - 8500.0).abs() < 1e-9);
        assert_eq!(r.balance_history.len(), 50);
    }
}
