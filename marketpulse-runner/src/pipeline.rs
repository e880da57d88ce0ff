//! One full run: fetch, tasks, market reading, reports.

use crate::charts::ChartGenerator;
use crate::config::MarketPulseConfig;
use crate::reporting::{ReportGenerator, ReportPaths};
use crate::run_log::RunLog;
use crate::tasks::{market_reading, run_tasks, TaskContext, TaskTally, TASKS};
use anyhow::{Context, Result};
use marketpulse_core::data::{DataFetcher, FetchSummary};
use marketpulse_core::sink::EventSink;
use marketpulse_core::SeriesBundle;

#[derive(Debug)]
pub struct RunOutcome {
    pub fetch: FetchSummary,
    pub tasks: TaskTally,
    /// Cross-market analyses that produced a reading.
    pub readings: usize,
    pub reports: ReportPaths,
}

impl RunOutcome {
    /// The run succeeds when every scheduled task does.
    pub fn all_succeeded(&self) -> bool {
        self.tasks.all_succeeded()
    }
}

/// Run the pipeline against `fetcher`, recording everything in `log`.
///
/// Provider, analysis and chart failures are recorded and never abort the
/// run. Only an unusable output directory or a report write failure is an
/// `Err`.
pub fn run(
    config: &MarketPulseConfig,
    fetcher: &mut DataFetcher,
    log: &RunLog,
    force_refresh: bool,
) -> Result<RunOutcome> {
    let output_dir = &config.output.output_dir;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output dir {}", output_dir.display()))?;

    tracing::info!(force_refresh, "fetch cycle started");
    let fetch = fetcher.fetch_all(force_refresh, log);
    for symbol in config.extra_symbols() {
        fetcher.get_cached(&symbol, log);
    }
    tracing::info!(
        succeeded = fetch.succeeded,
        failed = fetch.failed,
        from_cache = fetch.from_cache,
        "fetch cycle finished"
    );

    let empty = SeriesBundle::new();
    let bundle = fetcher.bundle().unwrap_or(&empty);
    let charts = ChartGenerator::new(
        output_dir,
        config.output.chart_width,
        config.output.chart_height,
    );
    let ctx = TaskContext::new(config, bundle, &charts, log);

    let tasks = run_tasks(&ctx, TASKS);
    log.info(
        "tasks",
        &format!("{}/{} tasks succeeded", tasks.succeeded, tasks.total),
    );
    let readings = market_reading(&ctx);

    log.finish();
    let reports = ReportGenerator::new(output_dir).write_all(&log.snapshot())?;
    log.success("reports", &format!("Reports written to {}", output_dir.display()));

    Ok(RunOutcome {
        fetch,
        tasks,
        readings,
        reports,
    })
}
