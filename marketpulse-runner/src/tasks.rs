//! The task list and the market reading.
//!
//! Every task reads the fetched bundle, may draw charts and add insights, and
//! returns a [`TaskOutcome`]. The scheduler isolates tasks from each other: an
//! error or a panic in one is recorded and the next one still runs.

use crate::charts::{ChartError, ChartGenerator};
use crate::config::MarketPulseConfig;
use crate::run_log::RunLog;
use anyhow::Result;
use marketpulse_core::analysis::stats::pearson;
use marketpulse_core::analysis::{AnalysisError, MarketAnalyzer};
use marketpulse_core::data::symbols;
use marketpulse_core::sink::EventSink;
use marketpulse_core::{normalize, validate, Series, SeriesBundle};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Insight categories, in report order.
pub mod insight {
    pub const INDEX_DIVERGENCE: &str = "Index divergence";
    pub const RISK_REGIME: &str = "Risk regime";
    pub const CHINA_US: &str = "China/US linkage";
    pub const LIQUIDITY: &str = "Liquidity";
    pub const EQUITY_BOND: &str = "Equity-bond spread";
    pub const SECTOR_ROTATION: &str = "Sector rotation";
    pub const OIL_GOLD: &str = "Oil/gold ratio";
    pub const MARGIN: &str = "Margin balance";

    pub const ALL: [&str; 8] = [
        INDEX_DIVERGENCE,
        RISK_REGIME,
        CHINA_US,
        LIQUIDITY,
        EQUITY_BOND,
        SECTOR_ROTATION,
        OIL_GOLD,
        MARGIN,
    ];
}

const READING: &str = "market_reading";

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(String),
    /// Ran, but had nothing usable to produce.
    Skipped(String),
}

/// Everything a task may read or write.
pub struct TaskContext<'a> {
    pub config: &'a MarketPulseConfig,
    pub bundle: &'a SeriesBundle,
    pub charts: &'a ChartGenerator,
    pub log: &'a RunLog,
    empty: Series,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        config: &'a MarketPulseConfig,
        bundle: &'a SeriesBundle,
        charts: &'a ChartGenerator,
        log: &'a RunLog,
    ) -> Self {
        Self {
            config,
            bundle,
            charts,
            log,
            empty: Series::empty(),
        }
    }

    pub fn analyzer(&self) -> MarketAnalyzer<'a> {
        MarketAnalyzer::new(self.bundle, &self.config.thresholds)
    }

    /// The bundle entry for `symbol`, empty when absent.
    fn series(&self, symbol: &str) -> &Series {
        self.bundle.get(symbol).unwrap_or(&self.empty)
    }

    fn plot(&self, title: &str, lines: &[(&str, Series)], file: &str) -> Result<(), ChartError> {
        let refs: Vec<(&str, &Series)> = lines.iter().map(|(label, s)| (*label, s)).collect();
        self.charts.plot_lines(title, &refs, file, self.log).map(|_| ())
    }
}

pub type TaskFn = fn(&TaskContext<'_>) -> Result<TaskOutcome>;

/// The scheduled tasks, in run order.
pub const TASKS: &[(&str, TaskFn)] = &[
    ("Index charts", index_charts),
    ("Margin analysis", margin_analysis),
    ("Multi-indicator comparison", multi_indicator),
    ("Oil/gold ratio", oil_gold),
    ("HSI/RUT correlation", hsi_rut_correlation),
    ("Equity-bond spread", equity_bond_spread),
    ("Sector rotation", sector_rotation),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskTally {
    pub total: usize,
    pub succeeded: usize,
}

impl TaskTally {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Run `tasks` in order, recording each result in the run log.
pub fn run_tasks(ctx: &TaskContext<'_>, tasks: &[(&str, TaskFn)]) -> TaskTally {
    let mut tally = TaskTally {
        total: tasks.len(),
        succeeded: 0,
    };
    for (name, task) in tasks {
        tracing::info!(task = %name, "task started");
        match catch_unwind(AssertUnwindSafe(|| task(ctx))) {
            Ok(Ok(TaskOutcome::Completed(message))) => {
                tally.succeeded += 1;
                ctx.log.success(name, &message);
            }
            Ok(Ok(TaskOutcome::Skipped(reason))) => ctx.log.warning(name, &reason),
            Ok(Err(e)) if is_data_shortage(&e) => ctx.log.warning(name, &format!("{e:#}")),
            Ok(Err(e)) => {
                tracing::error!(task = %name, error = %e, "task failed");
                ctx.log.error(name, &format!("{e:#}"));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(task = %name, panic = %message, "task panicked");
                ctx.log.error(name, &format!("panicked: {message}"));
            }
        }
    }
    tally
}

/// Missing or short data is a warning, not a failure.
fn is_data_shortage(e: &anyhow::Error) -> bool {
    if let Some(err) = e.downcast_ref::<AnalysisError>() {
        return err.is_data_shortage();
    }
    matches!(e.downcast_ref::<ChartError>(), Some(ChartError::NoData(_)))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Tasks ────────────────────────────────────────────────────────────

fn index_charts(ctx: &TaskContext<'_>) -> Result<TaskOutcome> {
    let charts = &ctx.config.charts.indices;
    let drawn = charts
        .iter()
        .filter(|chart| {
            let recent = ctx.series(&chart.ticker).tail(chart.points);
            ctx.plot(chart.display_title(), &[(chart.ticker.as_str(), recent)], &chart.file)
                .is_ok()
        })
        .count();
    Ok(if drawn > 0 {
        TaskOutcome::Completed(format!("{drawn} of {} index charts drawn", charts.len()))
    } else {
        TaskOutcome::Skipped("No index chart had enough data".into())
    })
}

fn margin_analysis(ctx: &TaskContext<'_>) -> Result<TaskOutcome> {
    let trend = ctx.analyzer().margin_vs_ma10()?;
    let to_yi = |v: f64| v / 1e8;
    ctx.plot(
        "Margin balance vs MA10 (100M CNY)",
        &[
            ("Margin balance", trend.balance_history.map(to_yi)),
            ("MA10", trend.ma10_history.map(to_yi)),
        ],
        "margin_ma10.svg",
    )?;
    if trend.below_ma10 {
        ctx.log
            .warning(insight::MARGIN, "Margin balance below MA10: leveraged money leaving");
    }
    let summary = trend.summary();
    ctx.log.add_insight(insight::MARGIN, summary.clone());
    Ok(TaskOutcome::Completed(summary))
}

fn multi_indicator(ctx: &TaskContext<'_>) -> Result<TaskOutcome> {
    let margin = normalize(ctx.series(symbols::MARGIN_BALANCE));
    let spread = ctx.series(symbols::CN_US_SPREAD);
    // Inverted so a stronger yuan plots upward.
    let yuan = normalize(&ctx.series(symbols::FX_USD).map(|v| -v));

    let charts = [
        (
            "Normalized indicators",
            vec![
                ("Margin balance", margin.clone()),
                ("USD/CNY (inverted)", yuan),
                ("CN-US 10Y spread", normalize(spread)),
                ("CSI 500 ETF", normalize(ctx.series(symbols::CSI500_ETF))),
            ],
            "margin_indicators.svg",
        ),
        (
            "Margin balance vs ETFs",
            vec![
                ("Margin balance", margin),
                ("CSI 300 ETF", normalize(ctx.series(symbols::CSI300_ETF))),
                ("CSI 1000 ETF", normalize(ctx.series(symbols::CSI1000_ETF))),
            ],
            "margin_etfs.svg",
        ),
        (
            "Liquidity indicators",
            vec![
                ("Shibor 1M", normalize(&ctx.series(symbols::SHIBOR_1M).tail(200))),
                ("CN-US 10Y spread", normalize(&spread.tail(200))),
            ],
            "liquidity.svg",
        ),
    ];

    let drawn = charts
        .iter()
        .filter(|(title, lines, file)| ctx.plot(title, lines, file).is_ok())
        .count();
    Ok(if drawn > 0 {
        TaskOutcome::Completed(format!("{drawn} of {} comparison charts drawn", charts.len()))
    } else {
        TaskOutcome::Skipped("No comparison chart had enough data".into())
    })
}

fn oil_gold(ctx: &TaskContext<'_>) -> Result<TaskOutcome> {
    let ratio = ctx.analyzer().oil_gold_ratio()?;
    ctx.plot(
        "Oil/gold ratio vs US 10Y yield (normalized)",
        &[
            ("Oil/gold ratio", normalize(&ratio.history.tail(300))),
            ("US 10Y yield", normalize(&ratio.us_bond_history.tail(300))),
        ],
        "oil_gold.svg",
    )?;
    let summary = ratio.summary();
    ctx.log.add_insight(insight::OIL_GOLD, summary.clone());
    Ok(TaskOutcome::Completed(summary))
}

fn hsi_rut_correlation(ctx: &TaskContext<'_>) -> Result<TaskOutcome> {
    let (hsi, rut) = ctx
        .series(symbols::HANG_SENG)
        .drop_nan()
        .inner_join(&ctx.series(symbols::RUSSELL_2000).drop_nan());
    if !validate(Some(&hsi), ctx.config.thresholds.min_points) {
        return Ok(TaskOutcome::Skipped(format!(
            "Only {} shared HSI/RUT points",
            hsi.len()
        )));
    }

    let corr = pearson(hsi.values(), rut.values());
    let rebase = |s: &Series| match s.first() {
        Some((_, base)) => s.map(|v| v / base),
        None => s.clone(),
    };
    ctx.plot(
        "Hang Seng vs Russell 2000 (rebased)",
        &[("HSI", rebase(&hsi)), ("RUT", rebase(&rut))],
        "hsi_rut_comparison.svg",
    )?;

    Ok(TaskOutcome::Completed(match corr {
        Some(c) => format!("HSI/RUT correlation {c:.4}"),
        None => "HSI/RUT correlation undefined".to_string(),
    }))
}

fn equity_bond_spread(ctx: &TaskContext<'_>) -> Result<TaskOutcome> {
    let spread = ctx.analyzer().equity_bond_spread()?;
    ctx.plot(
        "SSE 50 earnings yield minus CN 10Y yield (pp)",
        &[("Spread", spread.history.clone())],
        "pe_bond_spread.svg",
    )?;
    ctx.log.set_signal("valuation", spread.valuation.label());
    let summary = spread.summary();
    ctx.log.add_insight(insight::EQUITY_BOND, summary.clone());
    Ok(TaskOutcome::Completed(summary))
}

fn sector_rotation(ctx: &TaskContext<'_>) -> Result<TaskOutcome> {
    let rotation = ctx
        .analyzer()
        .sector_rotation(&ctx.config.fetch.roster.sector_etfs)?;
    ctx.charts.plot_bars(
        "Sector ETFs, last month",
        &rotation.sorted_returns,
        "sector_rotation.svg",
        ctx.log,
    )?;
    let summary = rotation.summary();
    ctx.log.add_insight(insight::SECTOR_ROTATION, summary.clone());
    Ok(TaskOutcome::Completed(summary))
}

// ── Market reading ───────────────────────────────────────────────────

/// Run the four cross-market analyses and record their insights and
/// signals. Returns how many produced a reading.
pub fn market_reading(ctx: &TaskContext<'_>) -> usize {
    let analyzer = ctx.analyzer();
    let log = ctx.log;
    let mut produced = 0;

    let skip = |what: &str, e: AnalysisError| {
        tracing::info!(analysis = what, reason = %e, "analysis skipped");
        log.warning(READING, &format!("{what}: {e}"));
    };

    match analyzer.index_divergence() {
        Ok(d) => {
            produced += 1;
            log.add_insight(insight::INDEX_DIVERGENCE, d.summary());
            if d.small_cap_vol_alert {
                log.warning(READING, "Small-cap volatility well above the index average");
            }
            if d.size_divergence_alert {
                log.warning(READING, "Nasdaq and Russell 2000 are decoupling");
            }
        }
        Err(e) => skip(insight::INDEX_DIVERGENCE, e),
    }

    match analyzer.risk_regime() {
        Ok(r) => {
            produced += 1;
            log.add_insight(insight::RISK_REGIME, r.summary());
            log.set_signal("risk_level", r.risk_level.label());
            log.set_signal("risk_action", r.action());
        }
        Err(e) => skip(insight::RISK_REGIME, e),
    }

    match analyzer.china_us_linkage() {
        Ok(l) => {
            produced += 1;
            log.add_insight(insight::CHINA_US, l.summary());
            if l.double_pressure {
                log.warning(READING, "Hong Kong lagging while the yuan weakens");
            }
            if l.fx_divergence {
                log.warning(READING, "Hang Seng and yuan moving against each other");
            }
        }
        Err(e) => skip(insight::CHINA_US, e),
    }

    match analyzer.liquidity() {
        Ok(l) => {
            produced += 1;
            log.add_insight(insight::LIQUIDITY, l.summary());
            log.set_signal("liquidity_env", l.environment.label());
        }
        Err(e) => skip(insight::LIQUIDITY, e),
    }

    produced
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketpulse_core::sink::EventStatus;

    fn fixture() -> (MarketPulseConfig, SeriesBundle, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (MarketPulseConfig::default(), SeriesBundle::new(), dir)
    }

    fn ok_task(_: &TaskContext<'_>) -> Result<TaskOutcome> {
        Ok(TaskOutcome::Completed("done".into()))
    }

    fn skipped_task(_: &TaskContext<'_>) -> Result<TaskOutcome> {
        Ok(TaskOutcome::Skipped("nothing to do".into()))
    }

    fn failing_task(_: &TaskContext<'_>) -> Result<TaskOutcome> {
        anyhow::bail!("provider schema changed")
    }

    fn short_data_task(_: &TaskContext<'_>) -> Result<TaskOutcome> {
        Err(AnalysisError::InsufficientData {
            what: "^VIX".into(),
            needed: 30,
            got: 3,
        }
        .into())
    }

    fn missing_symbol_task(_: &TaskContext<'_>) -> Result<TaskOutcome> {
        Err(AnalysisError::MissingSymbol("^HSI".into()).into())
    }

    fn panicking_task(_: &TaskContext<'_>) -> Result<TaskOutcome> {
        panic!("index out of bounds")
    }

    #[test]
    fn scheduler_isolates_failures() {
        let (config, bundle, dir) = fixture();
        let charts = ChartGenerator::new(dir.path(), 640, 480);
        let log = RunLog::quiet();
        let ctx = TaskContext::new(&config, &bundle, &charts, &log);

        let tasks: &[(&str, TaskFn)] = &[
            ("ok", ok_task),
            ("panics", panicking_task),
            ("fails", failing_task),
            ("short", short_data_task),
            ("missing", missing_symbol_task),
            ("skipped", skipped_task),
            ("ok again", ok_task),
        ];
        let tally = run_tasks(&ctx, tasks);

        assert_eq!(tally, TaskTally { total: 7, succeeded: 2 });
        assert!(!tally.all_succeeded());
        let report = log.snapshot();
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].contains("index out of bounds"));
        assert_eq!(report.warnings.len(), 3);
        assert!(report.warnings.iter().any(|w| w.contains("^HSI")));
        assert_eq!(report.count(EventStatus::Success), 2);
    }

    #[test]
    fn empty_bundle_degrades_every_task() {
        let (config, bundle, dir) = fixture();
        let charts = ChartGenerator::new(dir.path(), 640, 480);
        let log = RunLog::quiet();
        let ctx = TaskContext::new(&config, &bundle, &charts, &log);

        let tally = run_tasks(&ctx, TASKS);
        assert_eq!(tally.total, TASKS.len());
        assert_eq!(tally.succeeded, 0);
        assert!(log.snapshot().errors.is_empty());

        assert_eq!(market_reading(&ctx), 0);
        assert!(log.snapshot().insights.is_empty());
    }

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
