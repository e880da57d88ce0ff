//! SVG line and bar charts.
//!
//! Dates go on the x axis as day numbers so the ranges stay plain `f64`.

use chrono::NaiveDate;
use marketpulse_core::sink::{EventExtra, EventSink, EventStatus};
use marketpulse_core::Series;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CATEGORY: &str = "charts";

/// Lines with fewer points are left off the chart.
pub const MIN_LINE_POINTS: usize = 5;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no drawable data for '{0}'")]
    NoData(String),

    #[error("chart backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(String),
}

fn backend<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Backend(e.to_string())
}

pub struct ChartGenerator {
    output_dir: PathBuf,
    width: u32,
    height: u32,
}

impl ChartGenerator {
    pub fn new(output_dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            width,
            height,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Draw each `(label, series)` as a line on one chart and write
    /// `{output_dir}/{file}`. Series under [`MIN_LINE_POINTS`] valid points
    /// are skipped; when none remain nothing is written.
    pub fn plot_lines(
        &self,
        title: &str,
        lines: &[(&str, &Series)],
        file: &str,
        sink: &dyn EventSink,
    ) -> Result<PathBuf, ChartError> {
        let result = self.draw_lines(title, lines, file);
        report(title, &result, sink);
        result
    }

    /// Horizontal bars, one per `(label, value)`, positive red and negative
    /// green.
    pub fn plot_bars(
        &self,
        title: &str,
        bars: &[(String, f64)],
        file: &str,
        sink: &dyn EventSink,
    ) -> Result<PathBuf, ChartError> {
        let result = self.draw_bars(title, bars, file);
        report(title, &result, sink);
        result
    }

    fn target(&self, file: &str) -> Result<PathBuf, ChartError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            ChartError::Io(format!("create {}: {e}", self.output_dir.display()))
        })?;
        Ok(self.output_dir.join(file))
    }

    fn draw_lines(
        &self,
        title: &str,
        lines: &[(&str, &Series)],
        file: &str,
    ) -> Result<PathBuf, ChartError> {
        let usable: Vec<(&str, Vec<(f64, f64)>)> = lines
            .iter()
            .filter_map(|(label, series)| {
                let clean = series.drop_nan();
                if clean.len() < MIN_LINE_POINTS {
                    tracing::debug!(chart = title, line = *label, points = clean.len(), "line skipped");
                    return None;
                }
                let points = clean.iter().map(|(d, v)| (day_number(d), v)).collect();
                Some((*label, points))
            })
            .collect();
        if usable.is_empty() {
            return Err(ChartError::NoData(title.to_string()));
        }

        let xs = usable.iter().flat_map(|(_, p)| p.iter().map(|(x, _)| *x));
        let ys = usable.iter().flat_map(|(_, p)| p.iter().map(|(_, y)| *y));
        let x_range = span(xs, 0.0);
        let y_range = span(ys, 0.05);

        let path = self.target(file)?;
        let root = SVGBackend::new(&path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(x_range, y_range)
            .map_err(backend)?;
        chart
            .configure_mesh()
            .x_labels(6)
            .x_label_formatter(&|x: &f64| date_label(*x))
            .draw()
            .map_err(backend)?;

        for (i, (label, points)) in usable.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(backend)?
                .label(*label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(path.clone())
    }

    fn draw_bars(&self, title: &str, bars: &[(String, f64)], file: &str) -> Result<PathBuf, ChartError> {
        let bars: Vec<&(String, f64)> = bars.iter().filter(|(_, v)| v.is_finite()).collect();
        if bars.is_empty() {
            return Err(ChartError::NoData(title.to_string()));
        }

        let values = bars.iter().map(|(_, v)| *v).chain([0.0]);
        let x_range = span(values, 0.15);
        let y_range = 0.0..bars.len() as f64;

        let path = self.target(file)?;
        let root = SVGBackend::new(&path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(10)
            .build_cartesian_2d(x_range, y_range)
            .map_err(backend)?;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(0)
            .x_desc("Return (%)")
            .draw()
            .map_err(backend)?;

        // Best performer on top.
        let row = |i: usize| (bars.len() - 1 - i) as f64;
        chart
            .draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
                let color = if *v > 0.0 { RED } else { GREEN };
                Rectangle::new([(0.0, row(i) + 0.15), (*v, row(i) + 0.85)], color.filled())
            }))
            .map_err(backend)?;
        chart
            .draw_series(bars.iter().enumerate().map(|(i, (label, v))| {
                Text::new(
                    format!("{label} {v:+.2}%"),
                    (0.0, row(i) + 0.5),
                    ("sans-serif", 14),
                )
            }))
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(path.clone())
    }
}

fn report(title: &str, result: &Result<PathBuf, ChartError>, sink: &dyn EventSink) {
    match result {
        Ok(path) => sink.record(
            CATEGORY,
            EventStatus::Success,
            &format!("Chart: {title}"),
            EventExtra::chart(path),
        ),
        Err(e @ ChartError::NoData(_)) => sink.warning(CATEGORY, &e.to_string()),
        Err(e) => {
            tracing::error!(chart = title, error = %e, "chart failed");
            sink.error(CATEGORY, &format!("{title}: {e}"));
        }
    }
}

fn day_number(date: NaiveDate) -> f64 {
    (date - NaiveDate::default()).num_days() as f64
}

fn date_label(day: f64) -> String {
    NaiveDate::default()
        .checked_add_signed(chrono::Duration::days(day.round() as i64))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// `min..max` of `values` widened by `pad` of the span on each side. A
/// degenerate span is widened to a unit range.
fn span(values: impl Iterator<Item = f64>, pad: f64) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if hi - lo <= f64::EPSILON {
        return (lo - 0.5)..(hi + 0.5);
    }
    let margin = (hi - lo) * pad;
    (lo - margin)..(hi + margin)
}
